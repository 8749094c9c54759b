//! Source outline: the addressable declarations of one TypeScript or
//! JavaScript file, extracted from its tree-sitter syntax tree.
//!
//! Only top-level statements (directly or behind `export`) are collected,
//! plus the methods of top-level classes. Every span includes the contiguous
//! comment block directly above the declaration, and any decorators.

use tree_sitter::{Language, Node, Parser, Tree};

use crate::types::LineSpan;

/// Initialiser kinds that make a `const f = ...` binding count as a function.
const FUNCTION_VALUE_KINDS: &[&str] =
    &["arrow_function", "function", "function_expression", "generator_function"];

/// A class and its methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassOutline {
    /// The class declaration, leading comments and decorators included.
    pub lines: LineSpan,
    /// Addressable methods in file order.
    pub methods: Vec<Method>,
    /// Class name.
    pub name: String,
}

/// One top-level declaration statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Which lookup family the statement belongs to.
    pub kind: DeclarationKind,
    /// The whole statement, leading comments included.
    pub lines: LineSpan,
    /// Every name the statement binds. Destructuring and `const a = 1, b = 2`
    /// bind several; all of them resolve to the entire statement.
    pub names: Vec<String>,
}

/// The declaration families symbol lookup distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    /// `class` and `abstract class`.
    Class,
    /// Function declarations and function-valued bindings.
    Function,
    /// Interfaces, type aliases, and enums.
    Type,
    /// Any other `const`/`let`/`var` statement.
    Variable,
}

/// A method (or function-valued field) of a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    /// Declared with `static`.
    pub is_static: bool,
    /// The member, leading comments and decorators included.
    pub lines: LineSpan,
    /// Method name as written.
    pub name: String,
}

/// Everything symbol resolution needs to know about one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceOutline {
    /// Top-level classes with their methods.
    pub classes: Vec<ClassOutline>,
    /// Declarations in file order, classes included.
    pub declarations: Vec<Declaration>,
}

impl SourceOutline {
    /// Every name a selector can address, e.g. `add` or `User#getName`, sorted.
    pub fn addressable_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .declarations
            .iter()
            .flat_map(|decl| decl.names.iter().cloned())
            .chain(self.classes.iter().flat_map(|class| {
                class.methods.iter().map(|method| format!("{}#{}", class.name, method.name))
            }))
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Parse source text and extract its outline.
///
/// # Errors
///
/// Returns a reason when the grammar cannot be loaded or the tree contains a
/// syntax error; a partially parsed file is never outlined.
pub fn parse_outline(source: &str, language: &Language) -> Result<SourceOutline, String> {
    let tree = parse_tree(source, language)?;
    let root = tree.root_node();
    if root.has_error() {
        let line = first_error(root).map_or(1, |node| row_to_line(node.start_position().row));
        return Err(format!("syntax error near line {line}"));
    }
    Ok(collect_program(root, source))
}

/// Collect class members that can be addressed as `Class#method`.
fn collect_class_methods(body: Node<'_>, source: &str) -> Vec<Method> {
    let mut cursor = body.walk();
    let members: Vec<Node<'_>> = body.named_children(&mut cursor).collect();

    let mut methods = Vec::new();
    for (idx, member) in members.iter().enumerate() {
        let Some(name) = method_name(*member, source) else {
            continue;
        };
        let preceding = members.get(..idx).unwrap_or_default();
        methods.push(Method {
            is_static: has_static_modifier(*member),
            lines: span_with_leading_comments(*member, preceding, source),
            name,
        });
    }
    methods
}

/// Walk the top-level statements of a program.
fn collect_program(root: Node<'_>, source: &str) -> SourceOutline {
    let mut outline = SourceOutline::default();
    let mut cursor = root.walk();
    let statements: Vec<Node<'_>> = root.named_children(&mut cursor).collect();

    for (idx, statement) in statements.iter().enumerate() {
        let preceding = statements.get(..idx).unwrap_or_default();
        let lines = span_with_leading_comments(*statement, preceding, source);
        collect_statement(exported_declaration(*statement), lines, source, &mut outline);
    }

    outline
}

/// Record the declaration(s) a top-level statement introduces.
fn collect_statement(node: Node<'_>, lines: LineSpan, source: &str, outline: &mut SourceOutline) {
    match node.kind() {
        "function_declaration" | "generator_function_declaration" | "function_expression"
        | "function" => {
            if let Some(name) = field_text(node, "name", source) {
                outline.declarations.push(Declaration {
                    kind: DeclarationKind::Function,
                    lines,
                    names: vec![name],
                });
            }
        },
        "abstract_class_declaration" | "class" | "class_declaration" => {
            let Some(name) = field_text(node, "name", source) else {
                return;
            };
            let methods = node
                .child_by_field_name("body")
                .map(|body| collect_class_methods(body, source))
                .unwrap_or_default();
            outline.declarations.push(Declaration {
                kind: DeclarationKind::Class,
                lines,
                names: vec![name.clone()],
            });
            outline.classes.push(ClassOutline { lines, methods, name });
        },
        "enum_declaration" | "interface_declaration" | "type_alias_declaration" => {
            if let Some(name) = field_text(node, "name", source) {
                outline.declarations.push(Declaration {
                    kind: DeclarationKind::Type,
                    lines,
                    names: vec![name],
                });
            }
        },
        "lexical_declaration" | "variable_declaration" => {
            collect_variable_statement(node, lines, source, outline);
        },
        _ => {},
    }
}

/// Split a `const`/`let`/`var` statement's bindings into function-valued and
/// plain names. Both groups point at the whole statement.
fn collect_variable_statement(
    node: Node<'_>,
    lines: LineSpan,
    source: &str,
    outline: &mut SourceOutline,
) {
    let mut functions = Vec::new();
    let mut variables = Vec::new();

    let mut cursor = node.walk();
    for declarator in node.named_children(&mut cursor) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let Some(name_node) = declarator.child_by_field_name("name") else {
            continue;
        };
        let function_valued = name_node.kind() == "identifier"
            && declarator
                .child_by_field_name("value")
                .is_some_and(|value| FUNCTION_VALUE_KINDS.contains(&value.kind()));
        if function_valued {
            functions.extend(node_text(name_node, source));
        } else {
            collect_binding_names(name_node, source, &mut variables);
        }
    }

    if !functions.is_empty() {
        outline.declarations.push(Declaration {
            kind: DeclarationKind::Function,
            lines,
            names: functions,
        });
    }
    if !variables.is_empty() {
        outline.declarations.push(Declaration {
            kind: DeclarationKind::Variable,
            lines,
            names: variables,
        });
    }
}

/// Names bound by a binding pattern. Default values and property keys bind nothing.
fn collect_binding_names(pattern: Node<'_>, source: &str, names: &mut Vec<String>) {
    match pattern.kind() {
        "identifier" | "shorthand_property_identifier_pattern" => {
            names.extend(node_text(pattern, source));
        },
        "pair_pattern" => {
            if let Some(value) = pattern.child_by_field_name("value") {
                collect_binding_names(value, source, names);
            }
        },
        "assignment_pattern" | "object_assignment_pattern" => {
            if let Some(left) = pattern.child_by_field_name("left") {
                collect_binding_names(left, source, names);
            }
        },
        "array_pattern" | "object_pattern" | "rest_pattern" => {
            let mut cursor = pattern.walk();
            for child in pattern.named_children(&mut cursor) {
                collect_binding_names(child, source, names);
            }
        },
        _ => {},
    }
}

/// The declaration behind `export` / `export default`, or the node itself.
fn exported_declaration(node: Node<'_>) -> Node<'_> {
    if node.kind() != "export_statement" {
        return node;
    }
    node.child_by_field_name("declaration")
        .or_else(|| node.child_by_field_name("value"))
        .unwrap_or(node)
}

/// Source text of a named field of `node`.
fn field_text(node: Node<'_>, field: &str, source: &str) -> Option<String> {
    node_text(node.child_by_field_name(field)?, source)
}

/// Depth-first search for the first error or missing node.
fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

/// Whether a class member carries the `static` keyword.
fn has_static_modifier(node: Node<'_>) -> bool {
    let mut cursor = node.walk();
    let is_static = node.children(&mut cursor).any(|child| child.kind() == "static");
    is_static
}

/// Name of a class member that can be addressed as a method.
fn method_name(member: Node<'_>, source: &str) -> Option<String> {
    let is_method = match member.kind() {
        "method_definition" => true,
        "field_definition" | "public_field_definition" => member
            .child_by_field_name("value")
            .is_some_and(|value| FUNCTION_VALUE_KINDS.contains(&value.kind())),
        _ => false,
    };
    if !is_method {
        return None;
    }
    member
        .child_by_field_name("name")
        .or_else(|| member.child_by_field_name("property"))
        .and_then(|name| node_text(name, source))
}

/// Source text covered by `node`.
fn node_text(node: Node<'_>, source: &str) -> Option<String> {
    node.utf8_text(source.as_bytes()).ok().map(str::to_string)
}

/// Parse source into a tree-sitter tree.
///
/// # Errors
///
/// Returns a reason if the language cannot be set or parsing fails.
fn parse_tree(source: &str, language: &Language) -> Result<Tree, String> {
    let mut parser = Parser::new();
    parser.set_language(language).map_err(|e| e.to_string())?;
    parser
        .parse(source, None)
        .ok_or_else(|| "tree-sitter returned None".to_string())
}

/// Convert a 0-based tree-sitter row to a 1-based line.
fn row_to_line(row: usize) -> u32 {
    u32::try_from(row.saturating_add(1)).unwrap_or(u32::MAX)
}

/// Line span of `node`, extended upward over decorators and over comments
/// that start their own line with no blank line before the next item.
fn span_with_leading_comments(node: Node<'_>, preceding: &[Node<'_>], source: &str) -> LineSpan {
    let end_position = node.end_position();
    let end_row = if end_position.column == 0 && end_position.row > node.start_position().row {
        end_position.row.saturating_sub(1)
    } else {
        end_position.row
    };

    let mut start_row = node.start_position().row;
    for prev in preceding.iter().rev() {
        let attached = match prev.kind() {
            "decorator" => true,
            "comment" => {
                prev.end_position().row.saturating_add(1) >= start_row && starts_line(*prev, source)
            },
            _ => false,
        };
        if !attached {
            break;
        }
        start_row = prev.start_position().row;
    }

    LineSpan::new(row_to_line(start_row), row_to_line(end_row))
}

/// Whether only indentation precedes `node` on its first line.
fn starts_line(node: Node<'_>, source: &str) -> bool {
    source
        .get(..node.start_byte())
        .and_then(|before| before.rsplit('\n').next())
        .is_some_and(|prefix| prefix.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outline(source: &str) -> SourceOutline {
        let language: Language = tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into();
        parse_outline(source, &language).unwrap()
    }

    fn find<'a>(outline: &'a SourceOutline, kind: DeclarationKind, name: &str) -> Option<&'a Declaration> {
        outline
            .declarations
            .iter()
            .find(|decl| decl.kind == kind && decl.names.iter().any(|n| n == name))
    }

    #[test]
    fn function_span_includes_attached_doc_comment() {
        let source = "import x from 'y';\n\n/**\n * Adds.\n */\nexport function add(a: number, b: number) {\n  return a + b;\n}\n";
        let outline = outline(source);
        let add = find(&outline, DeclarationKind::Function, "add").unwrap();
        assert_eq!(add.lines, LineSpan::new(3, 8));
    }

    #[test]
    fn blank_line_detaches_comment() {
        let source = "// unrelated\n\nfunction f() {}\n";
        let f = find(&outline(source), DeclarationKind::Function, "f").cloned().unwrap();
        assert_eq!(f.lines, LineSpan::new(3, 3));
    }

    #[test]
    fn trailing_comment_of_previous_statement_is_not_attached() {
        let source = "const a = 1; // note\nfunction g() {}\n";
        let g = find(&outline(source), DeclarationKind::Function, "g").cloned().unwrap();
        assert_eq!(g.lines, LineSpan::new(2, 2));
    }

    #[test]
    fn arrow_bindings_are_functions_and_others_are_variables() {
        let source = "export const greet = (name: string) => `hi ${name}`;\nconst a = 1, b = 2;\n";
        let outline = outline(source);
        assert_eq!(find(&outline, DeclarationKind::Function, "greet").unwrap().lines, LineSpan::new(1, 1));
        let multi = find(&outline, DeclarationKind::Variable, "b").unwrap();
        assert_eq!(multi.names, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(multi.lines, LineSpan::new(2, 2));
    }

    #[test]
    fn destructuring_binds_every_name_including_rest() {
        let source = "const { host, port: p = 80, ...rest } = config;\nlet [first, , ...others] = list;\n";
        let outline = outline(source);
        let object = find(&outline, DeclarationKind::Variable, "rest").unwrap();
        assert_eq!(object.names, vec!["host".to_string(), "p".to_string(), "rest".to_string()]);
        let array = find(&outline, DeclarationKind::Variable, "others").unwrap();
        assert_eq!(array.names, vec!["first".to_string(), "others".to_string()]);
        assert!(find(&outline, DeclarationKind::Variable, "config").is_none());
    }

    #[test]
    fn collects_class_methods_with_comments_and_static_flag() {
        let source = concat!(
            "export class User {\n",
            "  constructor(private name: string) {}\n",
            "\n",
            "  // Returns the name.\n",
            "  getName(): string {\n",
            "    return this.name;\n",
            "  }\n",
            "\n",
            "  static create(): User {\n",
            "    return new User('x');\n",
            "  }\n",
            "}\n",
        );
        let outline = outline(source);
        let class = outline.classes.first().unwrap();
        assert_eq!(class.name, "User");
        assert_eq!(class.lines, LineSpan::new(1, 12));

        let get_name = class.methods.iter().find(|m| m.name == "getName").unwrap();
        assert_eq!(get_name.lines, LineSpan::new(4, 7));
        assert!(!get_name.is_static);

        let create = class.methods.iter().find(|m| m.name == "create").unwrap();
        assert_eq!(create.lines, LineSpan::new(9, 11));
        assert!(create.is_static);
    }

    #[test]
    fn collects_types_and_default_exports() {
        let source = "interface Shape { area(): number }\ntype Id = string;\nenum Color { Red }\nexport default function main() {}\n";
        let outline = outline(source);
        assert!(find(&outline, DeclarationKind::Type, "Shape").is_some());
        assert!(find(&outline, DeclarationKind::Type, "Id").is_some());
        assert!(find(&outline, DeclarationKind::Type, "Color").is_some());
        assert_eq!(find(&outline, DeclarationKind::Function, "main").unwrap().lines, LineSpan::new(4, 4));
    }

    #[test]
    fn lists_addressable_names() {
        let source = "function add() {}\nclass User { getName() { return 1; } }\n";
        assert_eq!(
            outline(source).addressable_names(),
            vec!["User".to_string(), "User#getName".to_string(), "add".to_string()]
        );
    }

    #[test]
    fn syntax_error_is_reported() {
        let language: Language = tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into();
        let err = parse_outline("function broken( {\n", &language).unwrap_err();
        assert!(err.contains("syntax error"), "{err}");
    }
}
