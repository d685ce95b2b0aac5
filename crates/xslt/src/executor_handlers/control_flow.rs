use crate::ast::{Template, When};
use crate::error::XsltError;
use crate::executor::{Focus, TemplateExecutor};
use crate::output::OutputBuilder;
use vista_xpath::{DataSourceNode, Expression};

pub(crate) fn handle_if<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    test: &Expression,
    body: &Template,
    focus: Focus<N>,
    builder: &mut dyn OutputBuilder,
) -> Result<(), XsltError> {
    if executor.evaluate(test, focus)?.to_bool() {
        executor.execute_template(body, focus, builder)?;
    }
    Ok(())
}

pub(crate) fn handle_choose<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    whens: &[When],
    otherwise: Option<&Template>,
    focus: Focus<N>,
    builder: &mut dyn OutputBuilder,
) -> Result<(), XsltError> {
    for when_block in whens {
        if executor.evaluate(&when_block.test, focus)?.to_bool() {
            return executor.execute_template(&when_block.body, focus, builder);
        }
    }
    if let Some(otherwise_body) = otherwise {
        executor.execute_template(otherwise_body, focus, builder)?;
    }
    Ok(())
}
