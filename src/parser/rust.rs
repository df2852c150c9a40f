//! Rust extraction via `syn`, mirroring what the tree-sitter walker
//! produces for the other languages. Spans come from proc-macro2's
//! span-locations feature, so lines are 1-based like tree-sitter rows.

use anyhow::Result;
use syn::spanned::Spanned;
use syn::visit::Visit;

use super::{
    normalize_statement, CodeBlock, FunctionMetrics, ParsedFile, RawReference, RawSymbol,
    SymbolKind,
};
use super::languages::SourceLanguage;

pub fn parse_rust(module: &str, source: &str) -> Result<ParsedFile> {
    let ast = syn::parse_file(source)
        .map_err(|e| anyhow::anyhow!("rust syntax error: {e}"))?;

    let mut visitor = RustVisitor {
        module: module.to_string(),
        source_lines: source.lines().map(str::to_string).collect(),
        symbols: Vec::new(),
        references: Vec::new(),
        blocks: Vec::new(),
        functions: Vec::new(),
        scope_stack: Vec::new(),
        func_stack: Vec::new(),
    };
    visitor.visit_file(&ast);

    Ok(ParsedFile {
        language: SourceLanguage::Rust,
        module: module.to_string(),
        symbols: visitor.symbols,
        references: visitor.references,
        blocks: visitor.blocks,
        functions: visitor.functions,
    })
}

struct RustVisitor {
    module: String,
    source_lines: Vec<String>,
    symbols: Vec<RawSymbol>,
    references: Vec<RawReference>,
    blocks: Vec<CodeBlock>,
    functions: Vec<FunctionMetrics>,
    scope_stack: Vec<usize>,
    func_stack: Vec<usize>,
}

impl RustVisitor {
    fn qualified(&self, name: &str) -> String {
        match self.scope_stack.last() {
            Some(&idx) => format!("{}::{}", self.symbols[idx].qualified_name, name),
            None => format!("{}::{}", self.module, name),
        }
    }

    fn add_symbol(
        &mut self,
        name: String,
        kind: SymbolKind,
        line_start: usize,
        line_end: usize,
    ) -> usize {
        let qualified_name = self.qualified(&name);
        self.symbols.push(RawSymbol {
            name,
            qualified_name,
            kind,
            line_start,
            line_end,
            parent: self.scope_stack.last().copied(),
        });
        self.symbols.len() - 1
    }

    fn add_reference(&mut self, name: String, line: usize, is_write: bool) {
        if name.is_empty() {
            return;
        }
        // References inside a function body attribute to the innermost
        // enclosing function, matching the tree-sitter walker.
        let from = self.func_stack.last().map(|&f| self.functions[f].symbol);
        self.references.push(RawReference {
            name,
            line,
            from,
            is_write,
        });
    }

    fn bump_branch(&mut self, by: u32) {
        if let Some(&idx) = self.func_stack.last() {
            self.functions[idx].branch_count += by;
        }
    }

    fn extract_block(&mut self, symbol_idx: usize, block: &syn::Block) {
        let mut statements = Vec::new();
        for stmt in &block.stmts {
            let span = stmt.span();
            let (start, end) = (span.start().line, span.end().line);
            if start == 0 || start > self.source_lines.len() {
                continue;
            }
            let end = end.min(self.source_lines.len());
            let text = self.source_lines[start - 1..end].join(" ");
            let normalized = normalize_statement(&text);
            if !normalized.is_empty() && !normalized.starts_with("//") {
                statements.push(normalized);
            }
        }
        if statements.is_empty() {
            return;
        }
        let span = block.span();
        self.blocks.push(CodeBlock {
            owner: self.symbols[symbol_idx].qualified_name.clone(),
            line_start: span.start().line,
            line_end: span.end().line,
            statements,
        });
    }

    fn visit_fn_like(&mut self, name: String, span_start: usize, span_end: usize, block: &syn::Block) {
        let idx = self.add_symbol(name, SymbolKind::Function, span_start, span_end);
        self.functions.push(FunctionMetrics {
            symbol: idx,
            branch_count: 0,
        });
        let func_idx = self.functions.len() - 1;
        self.extract_block(idx, block);

        self.scope_stack.push(idx);
        self.func_stack.push(func_idx);
        self.visit_block(block);
        self.func_stack.pop();
        self.scope_stack.pop();
    }
}

impl<'ast> Visit<'ast> for RustVisitor {
    fn visit_item_fn(&mut self, node: &'ast syn::ItemFn) {
        let span = node.span();
        self.visit_fn_like(
            node.sig.ident.to_string(),
            span.start().line,
            span.end().line,
            &node.block,
        );
    }

    fn visit_impl_item_fn(&mut self, node: &'ast syn::ImplItemFn) {
        let span = node.span();
        self.visit_fn_like(
            node.sig.ident.to_string(),
            span.start().line,
            span.end().line,
            &node.block,
        );
    }

    fn visit_item_struct(&mut self, node: &'ast syn::ItemStruct) {
        let span = node.span();
        self.add_symbol(
            node.ident.to_string(),
            SymbolKind::Class,
            span.start().line,
            span.end().line,
        );
        syn::visit::visit_item_struct(self, node);
    }

    fn visit_item_enum(&mut self, node: &'ast syn::ItemEnum) {
        let span = node.span();
        self.add_symbol(
            node.ident.to_string(),
            SymbolKind::Class,
            span.start().line,
            span.end().line,
        );
        syn::visit::visit_item_enum(self, node);
    }

    fn visit_item_trait(&mut self, node: &'ast syn::ItemTrait) {
        let span = node.span();
        let idx = self.add_symbol(
            node.ident.to_string(),
            SymbolKind::Class,
            span.start().line,
            span.end().line,
        );
        self.scope_stack.push(idx);
        syn::visit::visit_item_trait(self, node);
        self.scope_stack.pop();
    }

    fn visit_item_impl(&mut self, node: &'ast syn::ItemImpl) {
        // Methods are qualified under the implemented type's name when it
        // resolves to a plain path.
        if let syn::Type::Path(type_path) = &*node.self_ty {
            if let Some(seg) = type_path.path.segments.last() {
                self.add_reference(seg.ident.to_string(), node.span().start().line, false);
            }
        }
        syn::visit::visit_item_impl(self, node);
    }

    fn visit_item_static(&mut self, node: &'ast syn::ItemStatic) {
        let span = node.span();
        self.add_symbol(
            node.ident.to_string(),
            SymbolKind::ModuleVar,
            span.start().line,
            span.end().line,
        );
        syn::visit::visit_item_static(self, node);
    }

    fn visit_item_const(&mut self, node: &'ast syn::ItemConst) {
        let span = node.span();
        self.add_symbol(
            node.ident.to_string(),
            SymbolKind::ModuleVar,
            span.start().line,
            span.end().line,
        );
        syn::visit::visit_item_const(self, node);
    }

    fn visit_item_mod(&mut self, node: &'ast syn::ItemMod) {
        let span = node.span();
        let idx = self.add_symbol(
            node.ident.to_string(),
            SymbolKind::Class,
            span.start().line,
            span.end().line,
        );
        self.scope_stack.push(idx);
        syn::visit::visit_item_mod(self, node);
        self.scope_stack.pop();
    }

    fn visit_use_tree(&mut self, node: &'ast syn::UseTree) {
        match node {
            syn::UseTree::Name(n) => {
                let span = n.span();
                self.add_symbol(
                    n.ident.to_string(),
                    SymbolKind::ImportAlias,
                    span.start().line,
                    span.end().line,
                );
            }
            syn::UseTree::Rename(r) => {
                let span = r.span();
                self.add_symbol(
                    r.rename.to_string(),
                    SymbolKind::ImportAlias,
                    span.start().line,
                    span.end().line,
                );
            }
            _ => {}
        }
        syn::visit::visit_use_tree(self, node);
    }

    fn visit_expr_path(&mut self, node: &'ast syn::ExprPath) {
        if let Some(seg) = node.path.segments.last() {
            self.add_reference(seg.ident.to_string(), node.span().start().line, false);
        }
        syn::visit::visit_expr_path(self, node);
    }

    fn visit_expr_method_call(&mut self, node: &'ast syn::ExprMethodCall) {
        self.add_reference(node.method.to_string(), node.span().start().line, false);
        syn::visit::visit_expr_method_call(self, node);
    }

    fn visit_expr_assign(&mut self, node: &'ast syn::ExprAssign) {
        if let syn::Expr::Path(p) = &*node.left {
            if let Some(seg) = p.path.segments.last() {
                self.add_reference(seg.ident.to_string(), node.span().start().line, true);
            }
        }
        syn::visit::visit_expr_assign(self, node);
    }

    fn visit_expr_if(&mut self, node: &'ast syn::ExprIf) {
        self.bump_branch(1);
        syn::visit::visit_expr_if(self, node);
    }

    fn visit_expr_match(&mut self, node: &'ast syn::ExprMatch) {
        self.bump_branch(node.arms.len() as u32);
        syn::visit::visit_expr_match(self, node);
    }

    fn visit_expr_while(&mut self, node: &'ast syn::ExprWhile) {
        self.bump_branch(1);
        syn::visit::visit_expr_while(self, node);
    }

    fn visit_expr_for_loop(&mut self, node: &'ast syn::ExprForLoop) {
        self.bump_branch(1);
        syn::visit::visit_expr_for_loop(self, node);
    }

    fn visit_expr_binary(&mut self, node: &'ast syn::ExprBinary) {
        if matches!(node.op, syn::BinOp::And(_) | syn::BinOp::Or(_)) {
            self.bump_branch(1);
        }
        syn::visit::visit_expr_binary(self, node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_ifs_give_branch_count_three() {
        let src = "fn f(x: i32) -> i32 {\n    if x > 0 { return 1; }\n    if x > 1 { return 2; }\n    if x > 2 { return 3; }\n    0\n}\n";
        let parsed = parse_rust("m", src).unwrap();
        assert_eq!(parsed.functions.len(), 1);
        assert_eq!(parsed.functions[0].branch_count, 3);
    }

    #[test]
    fn statics_and_consts_are_module_vars() {
        let src = "static COUNTER: u32 = 0;\nconst LIMIT: usize = 10;\n";
        let parsed = parse_rust("m", src).unwrap();
        assert_eq!(
            parsed
                .symbols
                .iter()
                .filter(|s| s.kind == SymbolKind::ModuleVar)
                .count(),
            2
        );
    }

    #[test]
    fn impl_methods_are_functions() {
        let src = "struct S;\nimpl S {\n    fn go(&self) {}\n}\n";
        let parsed = parse_rust("m", src).unwrap();
        assert!(parsed
            .symbols
            .iter()
            .any(|s| s.name == "go" && s.kind == SymbolKind::Function));
        assert!(parsed.symbols.iter().any(|s| s.name == "S"));
    }

    #[test]
    fn use_rename_introduces_alias() {
        let src = "use std::collections::HashMap as Map;\nfn f() -> Map<u8, u8> { Map::new() }\n";
        let parsed = parse_rust("m", src).unwrap();
        assert!(parsed
            .symbols
            .iter()
            .any(|s| s.name == "Map" && s.kind == SymbolKind::ImportAlias));
    }

    #[test]
    fn invalid_rust_is_an_error() {
        assert!(parse_rust("m", "fn broken { nope").is_err());
    }
}
