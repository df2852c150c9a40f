//! Tree-sitter extraction for Python, JavaScript, TypeScript and Go.
//!
//! One walk per file collects symbol definitions, references, normalized
//! function blocks and branch counts. Node-kind tables keep the walker
//! generic across grammars.

use anyhow::Result;
use tree_sitter::Node;

use super::languages::{LanguageCache, SourceLanguage};
use super::{
    normalize_statement, CodeBlock, FunctionMetrics, ParsedFile, RawReference, RawSymbol,
    SymbolKind,
};

const MAX_DEPTH: usize = 512;

struct LangSpec {
    function_defs: &'static [&'static str],
    class_defs: &'static [&'static str],
    branch_kinds: &'static [&'static str],
    assignment_kinds: &'static [&'static str],
    identifier_kinds: &'static [&'static str],
    body_kinds: &'static [&'static str],
    short_circuit_ops: &'static [&'static str],
}

fn spec_for(language: SourceLanguage) -> &'static LangSpec {
    match language {
        SourceLanguage::Python => &PYTHON,
        SourceLanguage::JavaScript => &JAVASCRIPT,
        SourceLanguage::TypeScript => &TYPESCRIPT,
        SourceLanguage::Go => &GO,
        SourceLanguage::Rust => unreachable!("rust is parsed by syn"),
    }
}

static PYTHON: LangSpec = LangSpec {
    function_defs: &["function_definition"],
    class_defs: &["class_definition"],
    branch_kinds: &[
        "if_statement",
        "elif_clause",
        "for_statement",
        "while_statement",
        "except_clause",
        "conditional_expression",
        "case_clause",
    ],
    assignment_kinds: &["assignment", "augmented_assignment"],
    identifier_kinds: &["identifier"],
    body_kinds: &["block"],
    short_circuit_ops: &["and", "or"],
};

static JAVASCRIPT: LangSpec = LangSpec {
    function_defs: &[
        "function_declaration",
        "generator_function_declaration",
        "method_definition",
    ],
    class_defs: &["class_declaration"],
    branch_kinds: &[
        "if_statement",
        "for_statement",
        "for_in_statement",
        "while_statement",
        "do_statement",
        "catch_clause",
        "ternary_expression",
        "switch_case",
    ],
    assignment_kinds: &["assignment_expression", "augmented_assignment_expression"],
    identifier_kinds: &["identifier", "property_identifier", "shorthand_property_identifier"],
    body_kinds: &["statement_block"],
    short_circuit_ops: &["&&", "||", "??"],
};

static TYPESCRIPT: LangSpec = LangSpec {
    function_defs: &[
        "function_declaration",
        "generator_function_declaration",
        "method_definition",
    ],
    class_defs: &[
        "class_declaration",
        "abstract_class_declaration",
        "interface_declaration",
        "enum_declaration",
        "type_alias_declaration",
    ],
    branch_kinds: &[
        "if_statement",
        "for_statement",
        "for_in_statement",
        "while_statement",
        "do_statement",
        "catch_clause",
        "ternary_expression",
        "switch_case",
    ],
    assignment_kinds: &["assignment_expression", "augmented_assignment_expression"],
    identifier_kinds: &[
        "identifier",
        "property_identifier",
        "shorthand_property_identifier",
        "type_identifier",
    ],
    body_kinds: &["statement_block"],
    short_circuit_ops: &["&&", "||", "??"],
};

static GO: LangSpec = LangSpec {
    function_defs: &["function_declaration", "method_declaration"],
    class_defs: &["type_spec"],
    branch_kinds: &[
        "if_statement",
        "for_statement",
        "expression_case",
        "type_case",
        "communication_case",
    ],
    assignment_kinds: &["assignment_statement"],
    identifier_kinds: &["identifier", "field_identifier", "type_identifier"],
    body_kinds: &["block"],
    short_circuit_ops: &["&&", "||"],
};

struct Extractor<'a> {
    source: &'a [u8],
    spec: &'static LangSpec,
    language: SourceLanguage,
    module: String,
    symbols: Vec<RawSymbol>,
    references: Vec<RawReference>,
    blocks: Vec<CodeBlock>,
    functions: Vec<FunctionMetrics>,
    /// Stack of indexes into `functions` for branch attribution.
    func_stack: Vec<usize>,
    /// Module-level variable names already registered, to avoid duplicate
    /// symbols for repeated assignments.
    module_vars: std::collections::HashMap<String, usize>,
}

pub fn parse_tree_sitter(
    module: &str,
    language: SourceLanguage,
    source: &str,
) -> Result<ParsedFile> {
    let mut parser = LanguageCache::parser_for(language)?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| anyhow::anyhow!("failed to parse {language} source"))?;
    let root = tree.root_node();
    if root.has_error() {
        anyhow::bail!("{language} source contains syntax errors");
    }

    let mut ex = Extractor {
        source: source.as_bytes(),
        spec: spec_for(language),
        language,
        module: module.to_string(),
        symbols: Vec::new(),
        references: Vec::new(),
        blocks: Vec::new(),
        functions: Vec::new(),
        func_stack: Vec::new(),
        module_vars: std::collections::HashMap::new(),
    };
    ex.walk(root, None, 0);

    Ok(ParsedFile {
        language,
        module: module.to_string(),
        symbols: ex.symbols,
        references: ex.references,
        blocks: ex.blocks,
        functions: ex.functions,
    })
}

impl<'a> Extractor<'a> {
    fn text(&self, node: Node) -> String {
        node.utf8_text(self.source).unwrap_or("").to_string()
    }

    fn line(&self, node: Node) -> usize {
        node.start_position().row + 1
    }

    fn qualified(&self, scope: Option<usize>, name: &str) -> String {
        let sep = self.language.scope_separator();
        match scope {
            Some(idx) => format!("{}{}{}", self.symbols[idx].qualified_name, sep, name),
            None => format!("{}{}{}", self.module, sep, name),
        }
    }

    fn add_symbol(&mut self, name: String, kind: SymbolKind, node: Node, scope: Option<usize>) -> usize {
        let qualified_name = self.qualified(scope, &name);
        self.symbols.push(RawSymbol {
            name,
            qualified_name,
            kind,
            line_start: node.start_position().row + 1,
            line_end: node.end_position().row + 1,
            parent: scope,
        });
        self.symbols.len() - 1
    }

    fn add_reference(&mut self, name: String, line: usize, scope: Option<usize>, is_write: bool) {
        if name.is_empty() {
            return;
        }
        self.references.push(RawReference {
            name,
            line,
            from: scope,
            is_write,
        });
    }

    fn bump_branch(&mut self, by: u32) {
        if let Some(&idx) = self.func_stack.last() {
            self.functions[idx].branch_count += by;
        }
    }

    fn walk(&mut self, node: Node, scope: Option<usize>, depth: usize) {
        if depth > MAX_DEPTH {
            return;
        }
        let kind = node.kind();

        if self.spec.branch_kinds.contains(&kind) {
            self.bump_branch(1);
        }
        if kind == "binary_expression" || kind == "boolean_operator" {
            if let Some(op) = node.child_by_field_name("operator") {
                if self.spec.short_circuit_ops.contains(&op.kind()) {
                    self.bump_branch(1);
                }
            }
        }

        if self.spec.function_defs.contains(&kind) {
            self.visit_function(node, scope, depth);
            return;
        }
        if self.spec.class_defs.contains(&kind) {
            self.visit_class(node, scope, depth);
            return;
        }

        match kind {
            "import_statement" | "import_from_statement" | "import_declaration" => {
                self.visit_import(node, scope);
                // Fall through: no recursion needed below imports.
                return;
            }
            "variable_declarator" if scope.is_none() => {
                self.visit_top_level_declarator(node, depth);
                return;
            }
            "var_spec" | "const_spec" if scope.is_none() => {
                if let Some(name_node) = node.child_by_field_name("name") {
                    let name = self.text(name_node);
                    if !self.module_vars.contains_key(&name) {
                        let idx = self.add_symbol(name.clone(), SymbolKind::ModuleVar, node, None);
                        self.module_vars.insert(name, idx);
                    }
                }
            }
            _ => {}
        }

        if self.spec.assignment_kinds.contains(&kind) {
            self.visit_assignment(node, scope);
        }

        if self.spec.identifier_kinds.contains(&kind) {
            self.visit_identifier(node, scope);
            return;
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child, scope, depth + 1);
        }
    }

    fn visit_function(&mut self, node: Node, scope: Option<usize>, depth: usize) {
        let Some(name_node) = node.child_by_field_name("name") else {
            // Anonymous function expressions still contribute branches to
            // the enclosing function.
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                self.walk(child, scope, depth + 1);
            }
            return;
        };
        let name = self.text(name_node);
        let idx = self.add_symbol(name, SymbolKind::Function, node, scope);
        self.functions.push(FunctionMetrics {
            symbol: idx,
            branch_count: 0,
        });
        let func_idx = self.functions.len() - 1;
        self.func_stack.push(func_idx);

        if let Some(body) = node.child_by_field_name("body") {
            if self.spec.body_kinds.contains(&body.kind()) {
                self.extract_block(idx, body);
            }
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.id() != name_node.id() {
                self.walk(child, Some(idx), depth + 1);
            }
        }
        self.func_stack.pop();
    }

    fn visit_class(&mut self, node: Node, scope: Option<usize>, depth: usize) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node);
        let idx = self.add_symbol(name, SymbolKind::Class, node, scope);

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.id() != name_node.id() {
                self.walk(child, Some(idx), depth + 1);
            }
        }
    }

    /// Top-level `const f = () => {...}` declarators become Function
    /// symbols; plain initializers become module variables.
    fn visit_top_level_declarator(&mut self, node: Node, depth: usize) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node);
        let value = node.child_by_field_name("value");
        let is_function = value
            .map(|v| matches!(v.kind(), "arrow_function" | "function_expression" | "generator_function"))
            .unwrap_or(false);

        if is_function {
            let idx = self.add_symbol(name, SymbolKind::Function, node, None);
            self.functions.push(FunctionMetrics {
                symbol: idx,
                branch_count: 0,
            });
            let func_idx = self.functions.len() - 1;
            self.func_stack.push(func_idx);
            if let Some(v) = value {
                if let Some(body) = v.child_by_field_name("body") {
                    if self.spec.body_kinds.contains(&body.kind()) {
                        self.extract_block(idx, body);
                    }
                }
                self.walk(v, Some(idx), depth + 1);
            }
            self.func_stack.pop();
        } else {
            if !self.module_vars.contains_key(&name) {
                let idx = self.add_symbol(name.clone(), SymbolKind::ModuleVar, node, None);
                self.module_vars.insert(name, idx);
            }
            if let Some(v) = value {
                self.walk(v, None, depth + 1);
            }
        }
    }

    fn visit_import(&mut self, node: Node, scope: Option<usize>) {
        // Every identifier introduced by an import becomes an ImportAlias
        // definition; the dotted source path contributes a reference so that
        // imported modules count as used.
        let mut cursor = node.walk();
        let mut stack: Vec<Node> = node.children(&mut cursor).collect();
        while let Some(n) = stack.pop() {
            match n.kind() {
                "aliased_import" | "import_specifier" | "namespace_import" => {
                    let alias = n
                        .child_by_field_name("alias")
                        .or_else(|| n.child_by_field_name("name"));
                    if let Some(a) = alias {
                        let name = last_segment(&self.text(a));
                        self.add_symbol(name, SymbolKind::ImportAlias, n, scope);
                    }
                }
                "dotted_name" | "identifier" => {
                    let name = last_segment(&self.text(n));
                    // `import x` / `from m import x` / `import x from "m"`
                    // all introduce the alias x.
                    let parent_kind = n.parent().map(|p| p.kind()).unwrap_or("");
                    if matches!(
                        parent_kind,
                        "import_statement" | "import_from_statement" | "import_clause"
                    ) {
                        self.add_symbol(name.clone(), SymbolKind::ImportAlias, n, scope);
                    }
                    self.add_reference(name, self.line(n), scope, false);
                }
                "import_spec" => {
                    let name = if let Some(alias) = n.child_by_field_name("name") {
                        self.text(alias)
                    } else {
                        // Path string like "net/http" - alias defaults to the
                        // last path segment.
                        let path = self.text(n).trim_matches('"').to_string();
                        last_segment_path(&path)
                    };
                    self.add_symbol(name, SymbolKind::ImportAlias, n, scope);
                }
                _ => {
                    let mut c2 = n.walk();
                    stack.extend(n.children(&mut c2));
                }
            }
        }
    }

    fn visit_assignment(&mut self, node: Node, scope: Option<usize>) {
        let Some(left) = node.child_by_field_name("left") else {
            return;
        };
        let mut targets: Vec<Node> = Vec::new();
        if self.spec.identifier_kinds.contains(&left.kind()) {
            targets.push(left);
        } else if left.kind() == "expression_list" || left.kind() == "pattern_list" {
            let mut cursor = left.walk();
            for child in left.named_children(&mut cursor) {
                if self.spec.identifier_kinds.contains(&child.kind()) {
                    targets.push(child);
                }
            }
        }

        for t in targets {
            let name = self.text(t);
            if scope.is_none() && !self.module_vars.contains_key(&name) {
                let idx = self.add_symbol(name.clone(), SymbolKind::ModuleVar, t, None);
                self.module_vars.insert(name.clone(), idx);
            }
            self.add_reference(name, self.line(t), scope, true);
        }
    }

    fn visit_identifier(&mut self, node: Node, scope: Option<usize>) {
        // Skip identifiers that are definition names; those are symbols,
        // not references.
        if let Some(parent) = node.parent() {
            if let Some(name_field) = parent.child_by_field_name("name") {
                if name_field.id() == node.id()
                    && (self.spec.function_defs.contains(&parent.kind())
                        || self.spec.class_defs.contains(&parent.kind())
                        || parent.kind() == "variable_declarator")
                {
                    return;
                }
            }
            // Assignment targets were already recorded as writes.
            if self.spec.assignment_kinds.contains(&parent.kind()) {
                if let Some(left) = parent.child_by_field_name("left") {
                    if left.id() == node.id() {
                        return;
                    }
                }
            }
        }
        let name = self.text(node);
        let line = self.line(node);
        self.add_reference(name, line, scope, false);
    }

    fn extract_block(&mut self, symbol_idx: usize, body: Node) {
        let mut statements = Vec::new();
        let mut cursor = body.walk();
        for stmt in body.named_children(&mut cursor) {
            if stmt.kind() == "comment" {
                continue;
            }
            let normalized = normalize_statement(&self.text(stmt));
            if !normalized.is_empty() {
                statements.push(normalized);
            }
        }
        if statements.is_empty() {
            return;
        }
        self.blocks.push(CodeBlock {
            owner: self.symbols[symbol_idx].qualified_name.clone(),
            line_start: body.start_position().row + 1,
            line_end: body.end_position().row + 1,
            statements,
        });
    }
}

fn last_segment(dotted: &str) -> String {
    dotted.rsplit('.').next().unwrap_or(dotted).trim().to_string()
}

fn last_segment_path(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_branches_count_ifs() {
        let src = "def f(x):\n    if x:\n        pass\n    if x:\n        pass\n    if x:\n        pass\n";
        let parsed = parse_tree_sitter("m", SourceLanguage::Python, src).unwrap();
        assert_eq!(parsed.functions.len(), 1);
        assert_eq!(parsed.functions[0].branch_count, 3);
    }

    #[test]
    fn python_module_assignment_becomes_module_var() {
        let src = "COUNTER = 0\n\ndef bump():\n    return COUNTER\n";
        let parsed = parse_tree_sitter("m", SourceLanguage::Python, src).unwrap();
        assert!(parsed
            .symbols
            .iter()
            .any(|s| s.name == "COUNTER" && s.kind == SymbolKind::ModuleVar));
        // The assignment itself records a write at module level.
        assert!(parsed
            .references
            .iter()
            .any(|r| r.name == "COUNTER" && r.is_write && r.from.is_none()));
    }

    #[test]
    fn javascript_arrow_const_is_a_function() {
        let src = "const greet = (name) => {\n  if (name) {\n    return name;\n  }\n  return \"\";\n};\n";
        let parsed = parse_tree_sitter("m", SourceLanguage::JavaScript, src).unwrap();
        let greet = parsed
            .symbols
            .iter()
            .find(|s| s.name == "greet")
            .expect("greet symbol");
        assert_eq!(greet.kind, SymbolKind::Function);
        assert_eq!(parsed.functions.len(), 1);
        assert_eq!(parsed.functions[0].branch_count, 1);
    }

    #[test]
    fn go_functions_and_calls_extracted() {
        let src = "package main\n\nfunc helper() int {\n\treturn 1\n}\n\nfunc main() {\n\thelper()\n}\n";
        let parsed = parse_tree_sitter("m", SourceLanguage::Go, src).unwrap();
        let names: Vec<&str> = parsed.symbols.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"helper"));
        assert!(names.contains(&"main"));
        assert!(parsed
            .references
            .iter()
            .any(|r| r.name == "helper" && r.from.is_some()));
    }

    #[test]
    fn syntax_errors_are_rejected() {
        let src = "def broken(:\n";
        assert!(parse_tree_sitter("m", SourceLanguage::Python, src).is_err());
    }

    #[test]
    fn blocks_are_normalized() {
        let src = "def f():\n    x   =   1\n    y = x +  2\n    z = y * 3\n    return z\n";
        let parsed = parse_tree_sitter("m", SourceLanguage::Python, src).unwrap();
        assert_eq!(parsed.blocks.len(), 1);
        let block = &parsed.blocks[0];
        assert_eq!(block.statements[0], "x = 1");
        assert_eq!(block.statements.len(), 4);
    }
}
