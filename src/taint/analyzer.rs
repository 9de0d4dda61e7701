//! Taint propagation engine.
//!
//! Drives the expression classifier over assignments, returns, augmented
//! assignments, and exception handling inside each function body, mutating
//! that body's [`ScopeState`] and emitting [`Issue`]s when tainted data
//! reaches a return statement or a rendering sink without passing through a
//! recognized sanitizer.
//!
//! The classifier is an exhaustive match over tree-sitter-python node kinds
//! with a "clean" default arm: unknown expression shapes never taint, never
//! sanitize, and never panic. Every function scope is analyzed in isolation;
//! there is no call graph and no state survives a call to the analyzer.

use std::collections::{BTreeSet, HashSet};
use tree_sitter::Node;

use super::patterns::PatternTables;
use super::resolve::{dotted_name, literal_key};
use super::types::{Issue, ScopeState, Severity, TaintResult};

/// Calls that wrap their argument in an HTML context; used only by the
/// "does this return expression look like HTML" message heuristic.
const HTML_WRAPPING_CALLS: &[&str] = &[
    "Markup",
    "markupsafe.Markup",
    "HTMLResponse",
    "fastapi.responses.HTMLResponse",
    "render_template_string",
];

/// One-shot traversal state for a single document.
pub struct TaintAnalyzer<'a> {
    source: &'a [u8],
    tables: &'a PatternTables,
    /// Built-in sanitizer names plus user-defined wrappers from discovery
    sanitizers: HashSet<String>,
    issues: Vec<Issue>,
}

impl<'a> TaintAnalyzer<'a> {
    #[must_use]
    pub fn new(
        source: &'a [u8],
        tables: &'a PatternTables,
        discovered_sanitizers: HashSet<String>,
    ) -> Self {
        let mut sanitizers: HashSet<String> =
            tables.sanitizers.iter().map(|s| (*s).to_string()).collect();
        sanitizers.extend(discovered_sanitizers);
        Self {
            source,
            tables,
            sanitizers,
            issues: Vec::new(),
        }
    }

    /// Traverse the module and return issues in traversal order.
    #[must_use]
    pub fn run(mut self, root: Node) -> Vec<Issue> {
        let mut scope = ScopeState::new();
        self.visit_block(root, &mut scope);
        self.issues
    }

    fn text(&self, node: Node) -> &str {
        node.utf8_text(self.source).unwrap_or("")
    }

    // ---------- statements ----------

    fn visit_block(&mut self, block: Node, scope: &mut ScopeState) {
        let mut cursor = block.walk();
        let stmts: Vec<Node> = block.named_children(&mut cursor).collect();
        for stmt in stmts {
            self.visit_stmt(stmt, scope);
        }
    }

    fn visit_stmt(&mut self, node: Node, scope: &mut ScopeState) {
        match node.kind() {
            "expression_statement" => {
                let mut cursor = node.walk();
                let children: Vec<Node> = node.named_children(&mut cursor).collect();
                for child in children {
                    match child.kind() {
                        "assignment" => self.handle_assignment(child, scope),
                        "augmented_assignment" => self.handle_augmented(child, scope),
                        // Bare expression statements are classified purely
                        // for the sink-check side effect on call sites.
                        _ => {
                            self.classify(child, scope);
                        }
                    }
                }
            }
            "return_statement" => self.handle_return(node, scope),
            "try_statement" => self.handle_try(node, scope),
            "decorated_definition" => {
                let mut cursor = node.walk();
                let decorators: Vec<Node> = node
                    .named_children(&mut cursor)
                    .filter(|c| c.kind() == "decorator")
                    .collect();
                if let Some(definition) = node.child_by_field_name("definition") {
                    if definition.kind() == "function_definition" {
                        self.visit_function(definition, &decorators);
                    } else {
                        self.visit_stmt(definition, scope);
                    }
                }
            }
            "function_definition" => self.visit_function(node, &[]),
            "class_definition" => {
                // Class bodies are visited in the enclosing scope.
                if let Some(body) = node.child_by_field_name("body") {
                    self.visit_block(body, scope);
                }
            }
            "if_statement" | "for_statement" | "while_statement" | "with_statement"
            | "match_statement" | "elif_clause" | "else_clause" | "case_clause" => {
                self.visit_nested_blocks(node, scope);
            }
            _ => {}
        }
    }

    /// Descend into the block(s) of a compound statement, staying in the
    /// current scope.
    fn visit_nested_blocks(&mut self, node: Node, scope: &mut ScopeState) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            match child.kind() {
                "block" => self.visit_block(child, scope),
                "elif_clause" | "else_clause" | "case_clause" => {
                    self.visit_nested_blocks(child, scope);
                }
                _ => {}
            }
        }
    }

    fn handle_assignment(&mut self, node: Node, scope: &mut ScopeState) {
        let Some(first_target) = node.child_by_field_name("left") else {
            return;
        };

        // `a = b = rhs` parses as nested assignments on the right; unwrap to
        // a flat target list so the rhs is classified exactly once.
        let mut targets = vec![first_target];
        let mut value = node.child_by_field_name("right");
        while let Some(v) = value {
            if v.kind() != "assignment" {
                break;
            }
            if let Some(target) = v.child_by_field_name("left") {
                targets.push(target);
            }
            value = v.child_by_field_name("right");
        }

        // Annotated declarations without a value (`x: int`) assign clean.
        let result = match value {
            Some(v) => self.classify(v, scope),
            None => TaintResult::clean(),
        };

        if targets.len() > 1 {
            for target in targets {
                self.assign_target(target, result.clone(), None, scope);
            }
        } else {
            self.assign_target(targets[0], result, value, scope);
        }
    }

    fn handle_augmented(&mut self, node: Node, scope: &mut ScopeState) {
        let (Some(target), Some(value)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("right"),
        ) else {
            return;
        };
        let target_res = self.classify(target, scope);
        let value_res = self.classify(value, scope);
        let combined = TaintResult::merge([target_res, value_res]);
        self.assign_target(target, combined, None, scope);
    }

    fn assign_target(
        &mut self,
        target: Node,
        result: TaintResult,
        value_node: Option<Node>,
        scope: &mut ScopeState,
    ) {
        match target.kind() {
            "identifier" => {
                let name = self.text(target).to_string();
                let was_tainted = scope.is_tainted(&name);
                if result.tainted {
                    scope.mark_tainted(&name, &result.sources);
                } else if result.sanitized {
                    scope.mark_sanitized(&name);
                } else {
                    // Rebinding a tainted variable to a bare name that is not
                    // a recognized sanitizer keeps the taint: an unknown
                    // wrapper is assumed non-cleansing.
                    if was_tainted {
                        if let Some(value) = value_node {
                            if value.kind() == "identifier"
                                && !self.sanitizers.contains(self.text(value))
                            {
                                return;
                            }
                        }
                    }
                    scope.clear(&name);
                }
            }
            "pattern_list" | "tuple_pattern" | "list_pattern" => {
                let mut cursor = target.walk();
                let elements: Vec<Node> = target.named_children(&mut cursor).collect();
                let literal_values: Option<Vec<Node>> = value_node.and_then(|v| {
                    matches!(v.kind(), "tuple" | "list" | "expression_list").then(|| {
                        let mut vc = v.walk();
                        v.named_children(&mut vc).collect()
                    })
                });
                match literal_values {
                    Some(values) => {
                        // Element-wise; mismatched arities truncate to the
                        // shorter side, same best-effort as chained targets.
                        for (element, expr) in elements.into_iter().zip(values) {
                            let res = self.classify(expr, scope);
                            self.assign_target(element, res, Some(expr), scope);
                        }
                    }
                    None => {
                        for element in elements {
                            self.assign_target(element, result.clone(), value_node, scope);
                        }
                    }
                }
            }
            "subscript" => {
                let base = target.child_by_field_name("value");
                let key = target
                    .child_by_field_name("subscript")
                    .and_then(|k| literal_key(k, self.source));
                if let (Some(base), Some(key)) = (base, key) {
                    if base.kind() == "identifier" {
                        let container = self.text(base).to_string();
                        if result.tainted {
                            scope.taint_key(&container, &key);
                        } else {
                            scope.clear_key(&container, &key);
                        }
                    }
                }
            }
            "attribute" => {
                let object = target.child_by_field_name("object");
                let attr = target.child_by_field_name("attribute");
                if let (Some(object), Some(attr)) = (object, attr) {
                    if object.kind() == "identifier" {
                        let base = self.text(object).to_string();
                        let attr = self.text(attr).to_string();
                        if result.tainted {
                            scope.taint_attr(&base, &attr);
                        } else {
                            scope.clear_attr(&base, &attr);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn handle_return(&mut self, node: Node, scope: &mut ScopeState) {
        let Some(expr) = node.named_child(0) else {
            return;
        };
        let result = self.classify(expr, scope);
        if result.tainted && !result.sanitized {
            let label = if self.expression_contains_html(expr) {
                "HTML"
            } else {
                "value"
            };
            let mut message = format!("Possible XSS: returning tainted {label}");
            if !result.sources.is_empty() {
                message.push_str(&format!(" (sources: [{}])", join_sources(&result.sources)));
            }
            self.push_issue(node, message);
        }
    }

    /// Exception handling with sticky taint: names tainted inside the
    /// try-body stay tainted after each handler, modeling an exception
    /// raised partway through the body.
    fn handle_try(&mut self, node: Node, scope: &mut ScopeState) {
        let before = scope.tainted_snapshot();
        if let Some(body) = node.child_by_field_name("body") {
            self.visit_block(body, scope);
        }
        // Carry each sticky name's source labels through the re-marking.
        let sticky: Vec<(String, BTreeSet<String>)> = scope
            .tainted_snapshot()
            .into_iter()
            .filter(|name| !before.contains(name))
            .map(|name| {
                let sources = scope.taint_sources(&name).cloned().unwrap_or_default();
                (name, sources)
            })
            .collect();

        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            match child.kind() {
                "except_clause" | "except_group_clause" => {
                    self.visit_nested_blocks(child, scope);
                    for (name, sources) in &sticky {
                        scope.mark_tainted(name, sources);
                    }
                }
                "else_clause" | "finally_clause" => {
                    self.visit_nested_blocks(child, scope);
                }
                _ => {}
            }
        }
    }

    fn visit_function(&mut self, node: Node, decorators: &[Node]) {
        // Fresh, independently owned scope per function body; the enclosing
        // scope is left untouched and restored implicitly on return.
        let mut scope = ScopeState::new();

        if decorators.iter().any(|d| self.decorator_is_endpoint(*d)) {
            self.seed_handler_params(node, &mut scope);
        }

        if let Some(body) = node.child_by_field_name("body") {
            self.visit_block(body, &mut scope);
        }
    }

    fn decorator_is_endpoint(&self, decorator: Node) -> bool {
        let Some(expr) = decorator.named_child(0) else {
            return false;
        };
        let name = if expr.kind() == "call" {
            expr.child_by_field_name("function")
                .map(|f| dotted_name(f, self.source))
                .unwrap_or_default()
        } else {
            dotted_name(expr, self.source)
        };
        !name.is_empty() && self.tables.is_endpoint_marker(&name)
    }

    /// Routing-handler parameters arrive straight from the request: seed
    /// every declared parameter except self/cls/request as tainted.
    fn seed_handler_params(&self, node: Node, scope: &mut ScopeState) {
        let Some(params) = node.child_by_field_name("parameters") else {
            return;
        };
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            let name = match param.kind() {
                "identifier" => Some(self.text(param)),
                "typed_parameter" => param
                    .named_child(0)
                    .filter(|n| n.kind() == "identifier")
                    .map(|n| self.text(n)),
                "default_parameter" | "typed_default_parameter" => param
                    .child_by_field_name("name")
                    .filter(|n| n.kind() == "identifier")
                    .map(|n| self.text(n)),
                _ => None,
            };
            if let Some(name) = name {
                if !matches!(name, "self" | "cls" | "request") {
                    // Empty source set: the parameter cites itself.
                    scope.mark_tainted(name, &BTreeSet::new());
                }
            }
        }
    }

    // ---------- expressions ----------

    /// Classify one expression against the current scope. Pure except for
    /// the sink check performed on every call site.
    fn classify(&mut self, node: Node, scope: &mut ScopeState) -> TaintResult {
        match node.kind() {
            "integer" | "float" | "true" | "false" | "none" => TaintResult::clean(),
            "string" => self.classify_string(node, scope),
            "concatenated_string" => {
                let mut cursor = node.walk();
                let parts: Vec<Node> = node.named_children(&mut cursor).collect();
                let results: Vec<TaintResult> =
                    parts.into_iter().map(|p| self.classify(p, scope)).collect();
                TaintResult::merge(results)
            }
            "identifier" => {
                let name = self.text(node);
                if let Some(sources) = scope.taint_sources(name) {
                    TaintResult::tainted_with(sources.clone())
                } else if scope.is_sanitized(name) {
                    TaintResult::sanitized()
                } else {
                    TaintResult::clean()
                }
            }
            "attribute" => self.classify_attribute(node, scope),
            "subscript" => self.classify_subscript(node, scope),
            "call" => self.classify_call(node, scope),
            "binary_operator" => {
                let op = node
                    .child_by_field_name("operator")
                    .map(|o| o.kind())
                    .unwrap_or("");
                if op == "+" || op == "%" {
                    let results = self.classify_fields(node, &["left", "right"], scope);
                    TaintResult::merge(results)
                } else {
                    TaintResult::clean()
                }
            }
            "boolean_operator" => {
                let results = self.classify_fields(node, &["left", "right"], scope);
                TaintResult::merge(results)
            }
            "comparison_operator" => {
                let mut cursor = node.walk();
                let operands: Vec<Node> = node.named_children(&mut cursor).collect();
                let results: Vec<TaintResult> = operands
                    .into_iter()
                    .map(|o| self.classify(o, scope))
                    .collect();
                TaintResult::merge(results)
            }
            "conditional_expression" => {
                let body_res = node
                    .named_child(0)
                    .map(|n| self.classify(n, scope))
                    .unwrap_or_default();
                let else_res = node
                    .named_child(2)
                    .map(|n| self.classify(n, scope))
                    .unwrap_or_default();
                let tainted = body_res.tainted || else_res.tainted;
                let sanitized = body_res.sanitized && else_res.sanitized && !tainted;
                let mut sources = BTreeSet::new();
                if body_res.tainted {
                    sources.extend(body_res.sources);
                }
                if else_res.tainted {
                    sources.extend(else_res.sources);
                }
                TaintResult {
                    tainted,
                    sanitized,
                    sources,
                }
            }
            "dictionary" => {
                let mut cursor = node.walk();
                let values: Vec<Node> = node
                    .named_children(&mut cursor)
                    .filter(|c| c.kind() == "pair")
                    .filter_map(|pair| pair.child_by_field_name("value"))
                    .collect();
                let results: Vec<TaintResult> = values
                    .into_iter()
                    .map(|v| self.classify(v, scope))
                    .collect();
                TaintResult::merge(results)
            }
            "parenthesized_expression" => node
                .named_child(0)
                .map(|inner| self.classify(inner, scope))
                .unwrap_or_default(),
            // Conservative default: unknown shapes are clean.
            _ => TaintResult::clean(),
        }
    }

    fn classify_fields(
        &mut self,
        node: Node,
        fields: &[&str],
        scope: &mut ScopeState,
    ) -> Vec<TaintResult> {
        fields
            .iter()
            .filter_map(|f| node.child_by_field_name(f))
            .collect::<Vec<Node>>()
            .into_iter()
            .map(|n| self.classify(n, scope))
            .collect()
    }

    /// f-strings merge the classifications of their interpolations; literal
    /// text segments are ignored. Plain strings are clean.
    fn classify_string(&mut self, node: Node, scope: &mut ScopeState) -> TaintResult {
        let mut cursor = node.walk();
        let interpolations: Vec<Node> = node
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "interpolation")
            .collect();
        if interpolations.is_empty() {
            return TaintResult::clean();
        }
        let results: Vec<TaintResult> = interpolations
            .into_iter()
            .filter_map(|i| i.child_by_field_name("expression").or_else(|| i.named_child(0)))
            .collect::<Vec<Node>>()
            .into_iter()
            .map(|e| self.classify(e, scope))
            .collect();
        TaintResult::merge(results)
    }

    fn classify_attribute(&mut self, node: Node, scope: &mut ScopeState) -> TaintResult {
        let chain = dotted_name(node, self.source);
        if !chain.is_empty() && self.tables.is_request_attribute(&chain) {
            return TaintResult::tainted_by(chain);
        }

        let object = node.child_by_field_name("object");
        let attr = node.child_by_field_name("attribute");
        if let (Some(object), Some(attr)) = (object, attr) {
            if object.kind() == "identifier" {
                let base = self.text(object);
                let attr = self.text(attr);
                if scope.attr_is_tainted(base, attr) {
                    return TaintResult::tainted_by(format!("{base}.{attr}"));
                }
            }
        }

        let base_res = object
            .map(|o| self.classify(o, scope))
            .unwrap_or_default();
        if base_res.tainted {
            let sources = if base_res.sources.is_empty() {
                let mut set = BTreeSet::new();
                set.insert(chain);
                set
            } else {
                base_res.sources
            };
            return TaintResult::tainted_with(sources);
        }
        if base_res.sanitized {
            return TaintResult::sanitized();
        }
        TaintResult::clean()
    }

    fn classify_subscript(&mut self, node: Node, scope: &mut ScopeState) -> TaintResult {
        let Some(base) = node.child_by_field_name("value") else {
            return TaintResult::clean();
        };

        // request.form["q"], request["q"], self.request.args["q"], ...
        let is_request_source = match base.kind() {
            "attribute" => {
                let chain = dotted_name(base, self.source);
                !chain.is_empty() && self.tables.is_request_attribute(&chain)
            }
            "identifier" => self.text(base) == "request",
            _ => false,
        };
        if is_request_source {
            return TaintResult::tainted_by("request");
        }

        let base_res = self.classify(base, scope);
        if base_res.tainted {
            return TaintResult::tainted_with(base_res.sources);
        }

        if base.kind() == "identifier" {
            let container = self.text(base);
            if let Some(key) = node
                .child_by_field_name("subscript")
                .and_then(|k| literal_key(k, self.source))
            {
                if scope.key_is_tainted(container, &key) {
                    return TaintResult::tainted_by(format!("{container}[{key}]"));
                }
            }
        }

        if base_res.sanitized {
            return TaintResult::sanitized();
        }
        TaintResult::clean()
    }

    fn classify_call(&mut self, node: Node, scope: &mut ScopeState) -> TaintResult {
        let func = node.child_by_field_name("function");
        let name = func
            .map(|f| dotted_name(f, self.source))
            .unwrap_or_default();

        let arg_results = self.classify_arguments(node, scope);

        // Sink reporting is a side effect evaluated on every call site,
        // independent of how the call itself is classified.
        self.check_sink(node, &name, &arg_results);

        if self.tables.is_source_call(&name) {
            let label = if name.is_empty() {
                "external-input".to_string()
            } else {
                name
            };
            return TaintResult::tainted_by(label);
        }

        if self.tables.safe_json_responses.contains(name.as_str()) {
            return TaintResult::sanitized();
        }

        if self.sanitizers.contains(&name) {
            return TaintResult::sanitized();
        }

        // Cast-clean coercion neutralizes taint by narrowing representation.
        if let Some(func) = func {
            if func.kind() == "identifier" && self.tables.cast_clean.contains(name.as_str()) {
                if arg_results.iter().any(|r| r.tainted) {
                    return TaintResult::sanitized();
                }
                return TaintResult::clean();
            }
        }

        let mut sources = BTreeSet::new();
        for res in &arg_results {
            if res.tainted {
                sources.extend(res.sources.iter().cloned());
            }
        }
        let mut tainted = !sources.is_empty();
        let mut sanitized = !tainted && arg_results.iter().any(|r| r.sanitized);

        // `"<b>{}</b>".format(v)` with a tainted argument: a template shaped
        // like an HTML tag overrides the plain union outcome.
        if self.is_html_template_format(node) && arg_results.iter().any(|r| r.tainted) {
            tainted = true;
            sanitized = false;
        }

        TaintResult {
            tainted,
            sanitized,
            sources,
        }
    }

    fn classify_arguments(&mut self, node: Node, scope: &mut ScopeState) -> Vec<TaintResult> {
        let Some(arguments) = node.child_by_field_name("arguments") else {
            return Vec::new();
        };
        let mut cursor = arguments.walk();
        let args: Vec<Node> = arguments.named_children(&mut cursor).collect();
        args.into_iter()
            .map(|arg| match arg.kind() {
                "keyword_argument" => arg
                    .child_by_field_name("value")
                    .map(|v| self.classify(v, scope))
                    .unwrap_or_default(),
                "list_splat" | "dictionary_splat" => arg
                    .named_child(0)
                    .map(|v| self.classify(v, scope))
                    .unwrap_or_default(),
                _ => self.classify(arg, scope),
            })
            .collect()
    }

    /// Is this a `.format`/`.format_map` call on a string literal that looks
    /// like an HTML tag?
    fn is_html_template_format(&self, call: Node) -> bool {
        let Some(func) = call.child_by_field_name("function") else {
            return false;
        };
        if func.kind() != "attribute" {
            return false;
        }
        let method = func
            .child_by_field_name("attribute")
            .map(|a| self.text(a))
            .unwrap_or("");
        if method != "format" && method != "format_map" {
            return false;
        }
        func.child_by_field_name("object")
            .is_some_and(|obj| self.string_literal_has_html(obj))
    }

    /// Plain string literal (no interpolations) containing both `<` and `>`.
    fn string_literal_has_html(&self, node: Node) -> bool {
        if node.kind() != "string" {
            return false;
        }
        let mut cursor = node.walk();
        if node
            .named_children(&mut cursor)
            .any(|c| c.kind() == "interpolation")
        {
            return false;
        }
        let text = self.text(node);
        text.contains('<') && text.contains('>')
    }

    /// Heuristic used only for return-statement messages: does the returned
    /// expression construct something HTML-shaped?
    fn expression_contains_html(&self, node: Node) -> bool {
        match node.kind() {
            "string" => {
                let mut cursor = node.walk();
                let children: Vec<Node> = node.named_children(&mut cursor).collect();
                let has_interpolation = children.iter().any(|c| c.kind() == "interpolation");
                if !has_interpolation {
                    let text = self.text(node);
                    return text.contains('<') && text.contains('>');
                }
                children.into_iter().any(|child| match child.kind() {
                    "string_content" => {
                        let text = self.text(child);
                        text.contains('<') && text.contains('>')
                    }
                    "interpolation" => child
                        .child_by_field_name("expression")
                        .or_else(|| child.named_child(0))
                        .is_some_and(|e| self.expression_contains_html(e)),
                    _ => false,
                })
            }
            "concatenated_string" => {
                let mut cursor = node.walk();
                node.named_children(&mut cursor)
                    .collect::<Vec<Node>>()
                    .into_iter()
                    .any(|p| self.expression_contains_html(p))
            }
            "binary_operator" => {
                let op = node
                    .child_by_field_name("operator")
                    .map(|o| o.kind())
                    .unwrap_or("");
                if op != "+" {
                    return false;
                }
                node.child_by_field_name("left")
                    .is_some_and(|l| self.expression_contains_html(l))
                    || node
                        .child_by_field_name("right")
                        .is_some_and(|r| self.expression_contains_html(r))
            }
            "call" => {
                let name = node
                    .child_by_field_name("function")
                    .map(|f| dotted_name(f, self.source))
                    .unwrap_or_default();
                if HTML_WRAPPING_CALLS.contains(&name.as_str()) {
                    return true;
                }
                self.is_html_template_format(node)
            }
            "parenthesized_expression" => node
                .named_child(0)
                .is_some_and(|inner| self.expression_contains_html(inner)),
            _ => false,
        }
    }

    // ---------- sinks & issues ----------

    fn check_sink(&mut self, call: Node, name: &str, arg_results: &[TaintResult]) {
        let mut sources = BTreeSet::new();
        let mut any_tainted = false;
        for res in arg_results {
            if res.tainted && !res.sanitized {
                any_tainted = true;
                sources.extend(res.sources.iter().cloned());
            }
        }
        if !any_tainted {
            return;
        }
        if self.tables.safe_json_responses.contains(name) {
            return;
        }
        if name.is_empty() || !self.tables.is_sink_call(name) {
            return;
        }

        let mut message = format!("Possible XSS: tainted data flows into sink '{name}'");
        if !sources.is_empty() {
            message.push_str(&format!(" (sources: [{}])", join_sources(&sources)));
        }
        self.push_issue(call, message);
    }

    fn push_issue(&mut self, node: Node, message: String) {
        let start = node.start_position();
        let end = node.end_position();
        let col_start = start.column as u32;
        let col_end = if end.row == start.row && end.column > start.column {
            end.column as u32
        } else {
            col_start + 1
        };
        self.issues.push(Issue {
            line: start.row as u32,
            col_start,
            col_end,
            message,
            severity: Severity::Error,
        });
    }
}

fn join_sources(sources: &BTreeSet<String>) -> String {
    sources
        .iter()
        .map(String::as_str)
        .collect::<Vec<&str>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use crate::taint::analyze;

    #[test]
    fn test_source_to_return_is_reported() {
        let code = "\
v = request.args.get('q')
def page():
    v = request.args.get('q')
    return v
";
        let issues = analyze(code);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity.as_number(), 1);
        assert!(issues[0].message.contains("request.args.get"));
    }

    #[test]
    fn test_assignment_preserves_source_labels() {
        let code = "\
def page():
    v = request.args.get('q')
    return v
";
        let issues = analyze(code);
        assert_eq!(issues.len(), 1);
        assert_eq!(
            issues[0].message,
            "Possible XSS: returning tainted value (sources: [request.args.get])"
        );
    }

    #[test]
    fn test_sink_message_cites_request_source() {
        let code = "\
def page():
    v = request.form['q']
    render_template_string(v)
";
        let issues = analyze(code);
        assert_eq!(issues.len(), 1);
        assert_eq!(
            issues[0].message,
            "Possible XSS: tainted data flows into sink 'render_template_string' \
             (sources: [request])"
        );
    }

    #[test]
    fn test_sticky_taint_keeps_source_labels() {
        let code = "\
def page():
    try:
        v = request.args.get('q')
    except ValueError:
        v = 'fallback'
    return v
";
        let issues = analyze(code);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("request.args.get"));
    }

    #[test]
    fn test_bare_name_overwrite_keeps_source_labels() {
        let code = "\
def page():
    v = request.args.get('q')
    v = unknown_wrapper
    return v
";
        let issues = analyze(code);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("request.args.get"));
    }

    #[test]
    fn test_escape_suppresses_return_issue() {
        let code = "\
def page():
    v = request.args.get('q')
    return html.escape(v)
";
        assert!(analyze(code).is_empty());
    }

    #[test]
    fn test_form_subscript_to_sink() {
        let code = "\
def page():
    v = request.form['q']
    return render_template_string(v)
";
        let issues = analyze(code);
        // One issue for the sink call, one for returning its tainted result.
        assert!(!issues.is_empty());
        assert!(issues
            .iter()
            .any(|i| i.message.contains("render_template_string")));
    }

    #[test]
    fn test_cast_clean_neutralizes() {
        let code = "\
def page():
    age = int(request.args.get('age'))
    return f\"<p>{age}</p>\"
";
        assert!(analyze(code).is_empty());
    }

    #[test]
    fn test_jsonify_is_safe() {
        let code = "\
def page():
    v = request.json.get('q')
    return jsonify(v)
";
        assert!(analyze(code).is_empty());
    }

    #[test]
    fn test_endpoint_params_seeded_tainted() {
        let code = "\
@app.route('/hello/<name>')
def hello(name):
    return f\"<b>{name}</b>\"
";
        let issues = analyze(code);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("HTML"));
        assert!(issues[0].message.contains("name"));
    }

    #[test]
    fn test_self_cls_request_not_seeded() {
        let code = "\
@app.route('/x')
def view(self, cls, request):
    return f\"<b>{request}</b>\"
";
        assert!(analyze(code).is_empty());
    }

    #[test]
    fn test_undecorated_params_are_clean() {
        let code = "\
def helper(name):
    return f\"<b>{name}</b>\"
";
        assert!(analyze(code).is_empty());
    }

    #[test]
    fn test_fstring_propagates_taint() {
        let code = "\
def page():
    v = request.args.get('q')
    return f\"<div>{v}</div>\"
";
        let issues = analyze(code);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("HTML"));
    }

    #[test]
    fn test_concatenation_propagates_taint() {
        let code = "\
def page():
    v = request.args.get('q')
    return '<p>' + v + '</p>'
";
        let issues = analyze(code);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("HTML"));
    }

    #[test]
    fn test_percent_format_propagates_taint() {
        let code = "\
def page():
    v = request.args.get('q')
    return '<p>%s</p>' % v
";
        assert_eq!(analyze(code).len(), 1);
    }

    #[test]
    fn test_clean_overwrite_clears_taint() {
        let code = "\
def page():
    v = request.args.get('q')
    v = 'static'
    return v
";
        assert!(analyze(code).is_empty());
    }

    #[test]
    fn test_bare_name_overwrite_keeps_taint() {
        // Rebinding a tainted variable to an unknown bare name is assumed
        // non-cleansing.
        let code = "\
def page():
    v = request.args.get('q')
    v = unknown_wrapper
    return v
";
        assert_eq!(analyze(code).len(), 1);
    }

    #[test]
    fn test_chained_assignment_taints_all_targets() {
        let code = "\
def page():
    a = b = request.args.get('q')
    return b
";
        assert_eq!(analyze(code).len(), 1);
    }

    #[test]
    fn test_destructuring_elementwise() {
        let code = "\
def page():
    a, b = request.args.get('q'), 'static'
    return b
";
        assert!(analyze(code).is_empty());
        let code = "\
def page():
    a, b = request.args.get('q'), 'static'
    return a
";
        assert_eq!(analyze(code).len(), 1);
    }

    #[test]
    fn test_destructuring_broadcast() {
        let code = "\
def page():
    a, b = load()
    return a
";
        assert!(analyze(code).is_empty());
        let code = "\
def page():
    a, b = request.args
    return b
";
        assert_eq!(analyze(code).len(), 1);
    }

    #[test]
    fn test_container_key_granularity() {
        let code = "\
def page():
    d = {}
    d['q'] = request.args.get('q')
    d['safe'] = 'static'
    return d['safe']
";
        assert!(analyze(code).is_empty());
        let code = "\
def page():
    d = {}
    d['q'] = request.args.get('q')
    return d['q']
";
        assert_eq!(analyze(code).len(), 1);
    }

    #[test]
    fn test_attribute_taint_granularity() {
        let code = "\
def page():
    obj.name = request.args.get('q')
    return obj.name
";
        assert_eq!(analyze(code).len(), 1);
        let code = "\
def page():
    obj.name = request.args.get('q')
    obj.name = 'static'
    return obj.name
";
        assert!(analyze(code).is_empty());
    }

    #[test]
    fn test_augmented_assignment_merges() {
        let code = "\
def page():
    out = '<ul>'
    out += request.args.get('q')
    return out
";
        assert_eq!(analyze(code).len(), 1);
    }

    #[test]
    fn test_sticky_taint_after_handler() {
        let code = "\
def page():
    try:
        v = request.args.get('q')
    except ValueError:
        v = 'fallback'
    return v
";
        // Handler assigns clean, but taint from the try-body sticks.
        assert_eq!(analyze(code).len(), 1);
    }

    #[test]
    fn test_else_clause_can_sanitize() {
        let code = "\
def page():
    try:
        v = request.args.get('q')
    except ValueError:
        v = 'fallback'
    else:
        v = html.escape(v)
    return v
";
        assert!(analyze(code).is_empty());
    }

    #[test]
    fn test_scope_isolation() {
        let code = "\
def first():
    v = request.args.get('q')

def second():
    return v
";
        assert!(analyze(code).is_empty());
    }

    #[test]
    fn test_nested_function_does_not_leak_taint_out() {
        let code = "\
def outer():
    def inner():
        v = request.args.get('q')
    return v
";
        assert!(analyze(code).is_empty());
    }

    #[test]
    fn test_user_defined_sanitizer_recognized() {
        let code = "\
def clean(v):
    return html.escape(v)

def page():
    v = request.args.get('q')
    return clean(v)
";
        assert!(analyze(code).is_empty());
    }

    #[test]
    fn test_html_format_template_overrides() {
        let code = "\
def page():
    v = request.args.get('q')
    return '<b>{}</b>'.format(v)
";
        let issues = analyze(code);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("HTML"));
    }

    #[test]
    fn test_conditional_expression_branches() {
        let code = "\
def page():
    v = request.args.get('q')
    return v if v else 'default'
";
        assert_eq!(analyze(code).len(), 1);
        let code = "\
def page():
    v = request.args.get('q')
    a = html.escape(v)
    b = html.escape(v)
    return a if True else b
";
        assert!(analyze(code).is_empty());
    }

    #[test]
    fn test_sink_inside_expression_statement() {
        let code = "\
def page():
    v = request.args.get('q')
    render_template_string(v)
";
        let issues = analyze(code);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("render_template_string"));
    }

    #[test]
    fn test_sink_suffix_match() {
        let code = "\
def page():
    v = request.GET.get('q')
    return HttpResponse(v)
";
        let issues = analyze(code);
        assert!(issues
            .iter()
            .any(|i| i.message.contains("HttpResponse")));
    }

    #[test]
    fn test_issue_positions_are_zero_based() {
        let code = "v = request.args.get('q')\nrender_template_string(v)\n";
        let issues = analyze(code);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].line, 1);
        assert_eq!(issues[0].col_start, 0);
        assert!(issues[0].col_end > issues[0].col_start);
    }

    #[test]
    fn test_input_call_is_source() {
        let code = "\
def page():
    v = input()
    return render_template_string(v)
";
        assert!(!analyze(code).is_empty());
    }

    #[test]
    fn test_class_body_visited() {
        let code = "\
class Views:
    @app.route('/x')
    def show(self, name):
        return f\"<b>{name}</b>\"
";
        assert_eq!(analyze(code).len(), 1);
    }
}
