//! The template executor. It implements the XSLT "push" model: nodes are matched
//! against template rules and the selected rule's body writes into an
//! [`OutputBuilder`].

use crate::ast::{AttributeValueTemplate, AvtPart, Instruction, Stylesheet, Template, TemplateRule, Variable, VariableValue};
use crate::error::{Diagnostic, Severity, XsltError};
use crate::executor_handlers::{apply_templates, call_template, control_flow, copy, for_each, literals};
use crate::output::{OutputBuilder, ResultFragment, ResultTree, TextBuilder};
use std::collections::HashMap;
use std::marker::PhantomData;
use vista_xpath::{DataSourceNode, EvaluationContext, Fragment, KeyIndexes, XPathValue, evaluate};

/// Nesting limit for template invocations.
const MAX_DEPTH: usize = 256;

pub(crate) type Variables<N> = HashMap<String, XPathValue<N>>;

/// The context node with its position and the size of the list it came from.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Focus<N> {
    pub node: N,
    pub position: usize,
    pub size: usize,
}

impl<N> Focus<N> {
    pub fn single(node: N) -> Self {
        Focus {
            node,
            position: 1,
            size: 1,
        }
    }
}

/// A stateful executor that processes a compiled `Stylesheet` against a generic
/// `DataSourceNode`.
pub struct TemplateExecutor<'s, 'a, N: DataSourceNode<'a>> {
    pub(crate) stylesheet: &'s Stylesheet,
    root_node: N,
    globals: Variables<N>,
    key_indexes: KeyIndexes<N>,
    /// Scopes of the template currently executing; replaced on every invocation.
    variable_stack: Vec<Variables<N>>,
    depth: usize,
    diagnostics: Vec<Diagnostic>,
    _marker: PhantomData<&'a ()>,
}

impl<'s, 'a, N: DataSourceNode<'a> + 'a> TemplateExecutor<'s, 'a, N> {
    pub fn new(stylesheet: &'s Stylesheet, root_node: N) -> Self {
        Self {
            stylesheet,
            root_node,
            globals: HashMap::new(),
            key_indexes: HashMap::new(),
            variable_stack: vec![HashMap::new()],
            depth: 0,
            diagnostics: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Indexes keys, binds global variables and parameters, then applies
    /// templates to the root.
    pub fn run(&mut self, parameters: &HashMap<String, String>, builder: &mut dyn OutputBuilder) -> Result<(), XsltError> {
        let stylesheet: &'s Stylesheet = self.stylesheet;
        self.key_indexes = self.build_key_indexes()?;
        let root = Focus::single(self.root_node);
        for global in &stylesheet.globals {
            let name = &global.variable.name;
            let value = match parameters.get(name) {
                Some(value) if global.is_param => XPathValue::String(value.clone()),
                _ => self.evaluate_variable(&global.variable.value, root)?,
            };
            self.globals.insert(name.clone(), value);
        }
        apply_templates::apply_templates_to_nodes(self, &[self.root_node], None, &[], builder)
    }

    /// Walks the whole source once, indexing every node an `xsl:key` matches.
    fn build_key_indexes(&self) -> Result<KeyIndexes<N>, XsltError> {
        let stylesheet: &'s Stylesheet = self.stylesheet;
        let mut indexes: KeyIndexes<N> = HashMap::new();
        if stylesheet.keys.is_empty() {
            return Ok(indexes);
        }

        let no_variables = HashMap::new();
        let mut pending = vec![self.root_node];
        while let Some(node) = pending.pop() {
            let e_ctx = EvaluationContext::new(node, self.root_node, 1, 1, &no_variables, true);
            for key in &stylesheet.keys {
                let mut matched = false;
                for pattern in &key.patterns {
                    if pattern.matches(node, &e_ctx)? {
                        matched = true;
                        break;
                    }
                }
                if !matched {
                    continue;
                }
                let values = match evaluate(&key.use_expr, &e_ctx)? {
                    XPathValue::NodeSet(nodes) => nodes.iter().map(|n| n.string_value()).collect(),
                    other => vec![other.to_string()],
                };
                let index = indexes.entry(key.name.clone()).or_default();
                for value in values {
                    index.entry(value).or_default().push(node);
                }
            }
            pending.extend(node.attributes());
            pending.extend(node.children());
        }

        for nodes in indexes.values_mut().flat_map(|index| index.values_mut()) {
            nodes.sort();
            nodes.dedup();
        }
        log::debug!("Indexed {} keys", indexes.len());
        Ok(indexes)
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Records a recoverable problem; execution continues.
    pub(crate) fn diagnose(&mut self, message: String) {
        log::warn!("XSLT: {}", message);
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            message,
        });
    }

    // --- Scope management ---
    pub(crate) fn push_scope(&mut self) {
        self.variable_stack.push(HashMap::new());
    }

    pub(crate) fn pop_scope(&mut self) {
        self.variable_stack.pop();
    }

    pub(crate) fn set_variable_in_current_scope(&mut self, name: String, value: XPathValue<N>) {
        if let Some(scope) = self.variable_stack.last_mut() {
            scope.insert(name, value);
        }
    }

    pub(crate) fn get_merged_variables(&self) -> Variables<N> {
        let mut merged = self.globals.clone();
        for scope in &self.variable_stack {
            merged.extend(scope.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        merged
    }

    pub(crate) fn get_eval_context<'d>(
        &'d self,
        focus: Focus<N>,
        merged_variables: &'d Variables<N>,
    ) -> EvaluationContext<'a, 'd, N> {
        EvaluationContext::new(
            focus.node,
            self.root_node,
            focus.position,
            focus.size,
            merged_variables,
            true,
        )
        .with_keys(&self.key_indexes)
    }

    /// Evaluates `expression` against the current variables.
    pub(crate) fn evaluate(&self, expression: &vista_xpath::Expression, focus: Focus<N>) -> Result<XPathValue<N>, XsltError> {
        let merged_vars = self.get_merged_variables();
        let e_ctx = self.get_eval_context(focus, &merged_vars);
        Ok(evaluate(expression, &e_ctx)?)
    }

    /// Evaluates an expression that must produce a node-set.
    pub(crate) fn select_nodes(&self, expression: &vista_xpath::Expression, focus: Focus<N>) -> Result<Vec<N>, XsltError> {
        match self.evaluate(expression, focus)? {
            XPathValue::NodeSet(nodes) => Ok(nodes),
            other => Err(XsltError::Execution(format!(
                "select expression returned {:?} where a node-set is required",
                other
            ))),
        }
    }

    pub(crate) fn evaluate_avt(&self, avt: &AttributeValueTemplate, focus: Focus<N>) -> Result<String, XsltError> {
        match avt {
            AttributeValueTemplate::Static(s) => Ok(s.clone()),
            AttributeValueTemplate::Dynamic(parts) => {
                let merged_vars = self.get_merged_variables();
                let e_ctx = self.get_eval_context(focus, &merged_vars);
                let mut result = String::new();
                for part in parts {
                    match part {
                        AvtPart::Static(s) => result.push_str(s),
                        AvtPart::Dynamic(expression) => {
                            result.push_str(&evaluate(expression, &e_ctx)?.to_string());
                        }
                    }
                }
                Ok(result)
            }
        }
    }

    /// The value of a variable or parameter. Content is bound as a result tree
    /// fragment.
    pub(crate) fn evaluate_variable(&mut self, value: &VariableValue, focus: Focus<N>) -> Result<XPathValue<N>, XsltError> {
        match value {
            VariableValue::Select(expression) => self.evaluate(expression, focus),
            VariableValue::Content(body) => {
                let mut tree = ResultTree::new();
                self.execute_template(body, focus, &mut tree)?;
                Ok(XPathValue::Fragment(Fragment::new(ResultFragment(tree.into_document()))))
            }
            VariableValue::Empty => Ok(XPathValue::String(String::new())),
        }
    }

    /// Instantiates `body` and returns the text it produced.
    pub(crate) fn instantiate_to_string(&mut self, body: &Template, focus: Focus<N>) -> Result<String, XsltError> {
        let mut text = TextBuilder::default();
        self.execute_template(body, focus, &mut text)?;
        Ok(text.into_string())
    }

    /// Evaluates `with-param` values in the caller's context.
    pub(crate) fn evaluate_params(
        &mut self,
        params: &[Variable],
        focus: Focus<N>,
    ) -> Result<Vec<(String, XPathValue<N>)>, XsltError> {
        params
            .iter()
            .map(|param| Ok((param.name.clone(), self.evaluate_variable(&param.value, focus)?)))
            .collect()
    }

    /// Runs a template body in a fresh variable frame. Declared parameters take the
    /// passed value when there is one, else their default.
    pub(crate) fn invoke_template(
        &mut self,
        body: &Template,
        declared: &[Variable],
        passed: &[(String, XPathValue<N>)],
        focus: Focus<N>,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), XsltError> {
        if self.depth >= MAX_DEPTH {
            return Err(XsltError::Execution(format!(
                "template nesting exceeds {} levels; infinite recursion?",
                MAX_DEPTH
            )));
        }
        self.depth += 1;
        let caller_scopes = std::mem::replace(&mut self.variable_stack, vec![HashMap::new()]);

        let result = self.bind_params_and_execute(body, declared, passed, focus, builder);

        self.variable_stack = caller_scopes;
        self.depth -= 1;
        result
    }

    fn bind_params_and_execute(
        &mut self,
        body: &Template,
        declared: &[Variable],
        passed: &[(String, XPathValue<N>)],
        focus: Focus<N>,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), XsltError> {
        for param in declared {
            let value = match passed.iter().find(|(name, _)| *name == param.name) {
                Some((_, value)) => value.clone(),
                None => self.evaluate_variable(&param.value, focus)?,
            };
            self.set_variable_in_current_scope(param.name.clone(), value);
        }
        self.execute_template(body, focus, builder)
    }

    /// Processes the instructions of a body in their own variable scope.
    pub(crate) fn execute_template(
        &mut self,
        template: &Template,
        focus: Focus<N>,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), XsltError> {
        self.push_scope();
        let result = template
            .0
            .iter()
            .try_for_each(|instruction| self.execute_instruction(instruction, focus, builder));
        self.pop_scope();
        result
    }

    fn execute_instruction(
        &mut self,
        instruction: &Instruction,
        focus: Focus<N>,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), XsltError> {
        match instruction {
            Instruction::Text(text) => builder.add_text(text),
            Instruction::ValueOf { select } => {
                let content = self.evaluate(select, focus)?.to_string();
                builder.add_text(&content);
            }
            Instruction::LiteralElement { name, attributes, body } => {
                literals::handle_literal_element(self, name, attributes, body, focus, builder)?;
            }
            Instruction::Element { name, body } => literals::handle_element(self, name, body, focus, builder)?,
            Instruction::Attribute { name, body } => literals::handle_attribute(self, name, body, focus, builder)?,
            Instruction::Comment { body } => {
                let text = self.instantiate_to_string(body, focus)?;
                builder.add_comment(&text);
            }
            Instruction::ApplyTemplates {
                select,
                mode,
                params,
                sort_keys,
            } => apply_templates::handle_apply_templates(
                self,
                select.as_ref(),
                mode.as_deref(),
                params,
                sort_keys,
                focus,
                builder,
            )?,
            Instruction::CallTemplate { name, params } => {
                call_template::handle_call_template(self, name, params, focus, builder)?;
            }
            Instruction::ForEach { select, sort_keys, body } => {
                for_each::handle_for_each(self, select, sort_keys, body, focus, builder)?;
            }
            Instruction::If { test, body } => control_flow::handle_if(self, test, body, focus, builder)?,
            Instruction::Choose { whens, otherwise } => {
                control_flow::handle_choose(self, whens, otherwise.as_ref(), focus, builder)?;
            }
            Instruction::Copy { body } => copy::handle_copy(self, body, focus, builder)?,
            Instruction::CopyOf { select } => copy::handle_copy_of(self, select, focus, builder)?,
            Instruction::Variable(variable) => {
                let value = self.evaluate_variable(&variable.value, focus)?;
                self.set_variable_in_current_scope(variable.name.clone(), value);
            }
            Instruction::Message { body, terminate } => {
                let text = self.instantiate_to_string(body, focus)?;
                if *terminate {
                    return Err(XsltError::Terminated(text));
                }
                log::info!("xsl:message: {}", text);
            }
        }
        Ok(())
    }

    /// The highest ranked rule for `node` in `mode`: import precedence first,
    /// then priority, then the later declaration.
    pub(crate) fn find_matching_rule(&self, node: N, mode: Option<&str>) -> Result<Option<&'s TemplateRule>, XsltError> {
        let stylesheet: &'s Stylesheet = self.stylesheet;
        let merged_vars = self.get_merged_variables();
        let e_ctx = self.get_eval_context(Focus::single(node), &merged_vars);

        let mut best: Option<&'s TemplateRule> = None;
        for rule in stylesheet.rules.iter().filter(|r| r.mode.as_deref() == mode) {
            if best.is_some_and(|b| !outranks(rule, b)) {
                continue;
            }
            if rule.pattern.matches(node, &e_ctx)? {
                best = Some(rule);
            }
        }
        Ok(best)
    }
}

fn outranks(a: &TemplateRule, b: &TemplateRule) -> bool {
    a.precedence
        .cmp(&b.precedence)
        .then(a.priority.total_cmp(&b.priority))
        .then(a.position.cmp(&b.position))
        .is_gt()
}
