use crate::ast::Variable;
use crate::error::XsltError;
use crate::executor::{Focus, TemplateExecutor};
use crate::output::OutputBuilder;
use std::sync::Arc;
use vista_xpath::DataSourceNode;

/// Unknown templates are reported and skipped.
pub(crate) fn handle_call_template<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    name: &str,
    params: &[Variable],
    focus: Focus<N>,
    builder: &mut dyn OutputBuilder,
) -> Result<(), XsltError> {
    let Some(template) = executor.stylesheet.named_templates.get(name).map(Arc::clone) else {
        executor.diagnose(format!("call to unknown named template '{}'", name));
        return Ok(());
    };
    let passed = executor.evaluate_params(params, focus)?;
    executor.invoke_template(&template.body, &template.params, &passed, focus, builder)
}
