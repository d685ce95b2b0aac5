use crate::ast::{AttributeValueTemplate, Template};
use crate::error::XsltError;
use crate::executor::{Focus, TemplateExecutor};
use crate::output::OutputBuilder;
use vista_xpath::DataSourceNode;

pub(crate) fn handle_literal_element<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    name: &str,
    attributes: &[(String, AttributeValueTemplate)],
    body: &Template,
    focus: Focus<N>,
    builder: &mut dyn OutputBuilder,
) -> Result<(), XsltError> {
    // Evaluate every attribute before opening the element.
    let evaluated_attrs = attributes
        .iter()
        .map(|(name, avt)| Ok((name.as_str(), executor.evaluate_avt(avt, focus)?)))
        .collect::<Result<Vec<_>, XsltError>>()?;

    builder.start_element(name);
    for (name, value) in evaluated_attrs {
        builder.set_attribute(name, &value);
    }
    executor.execute_template(body, focus, builder)?;
    builder.end_element();
    Ok(())
}

/// `xsl:element`. An invalid computed name is reported and only the content is
/// instantiated.
pub(crate) fn handle_element<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    name: &AttributeValueTemplate,
    body: &Template,
    focus: Focus<N>,
    builder: &mut dyn OutputBuilder,
) -> Result<(), XsltError> {
    let name = executor.evaluate_avt(name, focus)?;
    if !is_qname(&name) {
        executor.diagnose(format!("xsl:element: invalid element name '{}'", name));
        return executor.execute_template(body, focus, builder);
    }
    builder.start_element(&name);
    executor.execute_template(body, focus, builder)?;
    builder.end_element();
    Ok(())
}

pub(crate) fn handle_attribute<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    name: &AttributeValueTemplate,
    body: &Template,
    focus: Focus<N>,
    builder: &mut dyn OutputBuilder,
) -> Result<(), XsltError> {
    let name = executor.evaluate_avt(name, focus)?;
    if !is_qname(&name) || name == "xmlns" {
        executor.diagnose(format!("xsl:attribute: invalid attribute name '{}'", name));
        return Ok(());
    }
    let value = executor.instantiate_to_string(body, focus)?;
    if !builder.set_attribute(&name, &value) {
        executor.diagnose(format!(
            "xsl:attribute: attribute '{}' cannot be added after child content",
            name
        ));
    }
    Ok(())
}

fn is_ncname(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn is_qname(name: &str) -> bool {
    match name.split_once(':') {
        Some((prefix, local)) => is_ncname(prefix) && is_ncname(local),
        None => is_ncname(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qname_validation() {
        assert!(is_qname("item"));
        assert!(is_qname("i18n:text"));
        assert!(is_qname("_a-b.c"));
        assert!(!is_qname(""));
        assert!(!is_qname("1st"));
        assert!(!is_qname("a:b:c"));
        assert!(!is_qname("a b"));
    }
}
