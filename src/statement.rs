//! Typed program statements.
//!
//! Statements are parsed from JSON values one at a time. A statement that does
//! not have a recognizable shape is kept as a [`StatementError`] in place of the
//! statement, so that an analysis can report it when (and only when) it reaches
//! that point of the program.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value as Json};

use crate::error::StatementError;

/// A structural child of an allocated block.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Field {
    Left,
    Right,
}

impl Field {
    pub fn name(self) -> &'static str {
        match self {
            Field::Left => "left",
            Field::Right => "right",
        }
    }
}

impl FromStr for Field {
    type Err = StatementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Field::Left),
            "right" => Ok(Field::Right),
            other => Err(StatementError::UnknownField(other.to_string())),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Allocation functions and operators.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AllocOp {
    Malloc,
    Calloc,
    Realloc,
    New,
    NewArray,
    AlignedAlloc,
    PosixMemalign,
    Memalign,
    Valloc,
    Pvalloc,
    AlignedNew,
}

impl AllocOp {
    pub const ALL: [AllocOp; 11] = [
        AllocOp::Malloc,
        AllocOp::Calloc,
        AllocOp::Realloc,
        AllocOp::New,
        AllocOp::NewArray,
        AllocOp::AlignedAlloc,
        AllocOp::PosixMemalign,
        AllocOp::Memalign,
        AllocOp::Valloc,
        AllocOp::Pvalloc,
        AllocOp::AlignedNew,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AllocOp::Malloc => "malloc",
            AllocOp::Calloc => "calloc",
            AllocOp::Realloc => "realloc",
            AllocOp::New => "new",
            AllocOp::NewArray => "new[]",
            AllocOp::AlignedAlloc => "aligned_alloc",
            AllocOp::PosixMemalign => "posix_memalign",
            AllocOp::Memalign => "memalign",
            AllocOp::Valloc => "valloc",
            AllocOp::Pvalloc => "pvalloc",
            AllocOp::AlignedNew => "aligned_new",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }
}

/// Deallocation functions and operators.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum FreeOp {
    Free,
    Delete,
    DeleteArray,
}

impl FreeOp {
    pub const ALL: [FreeOp; 3] = [FreeOp::Free, FreeOp::Delete, FreeOp::DeleteArray];

    pub fn name(self) -> &'static str {
        match self {
            FreeOp::Free => "free",
            FreeOp::Delete => "delete",
            FreeOp::DeleteArray => "delete[]",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }
}

/// Spellings of the null pointer.
pub const NULL_LITERALS: [&str; 3] = ["NULL", "null", "nullptr"];

/// The right-hand side of an assignment.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum PointerValue {
    Null,
    Alloc(AllocOp),
    Free(FreeOp),
    /// Another variable, optionally followed by a chain of fields.
    Pointer { variable: String, path: Vec<Field> },
}

impl PointerValue {
    /// Parses a value given as a bare string: a null literal, an allocation or a free.
    pub fn from_name(name: &str) -> Result<Self, StatementError> {
        if NULL_LITERALS.contains(&name) {
            Ok(PointerValue::Null)
        } else if let Some(op) = AllocOp::from_name(name) {
            Ok(PointerValue::Alloc(op))
        } else if let Some(op) = FreeOp::from_name(name) {
            Ok(PointerValue::Free(op))
        } else {
            Err(StatementError::UnknownValue(name.to_string()))
        }
    }

    fn from_json(value: &Json) -> Result<Self, StatementError> {
        match value {
            Json::Null => Ok(PointerValue::Null),
            Json::String(s) => Self::from_name(s),
            Json::Object(obj) => {
                let variable = required_str(obj, "variable")?;
                let path = match obj.get("field") {
                    Some(field) => parse_path(field)?.0,
                    None => Vec::new(),
                };
                Ok(PointerValue::Pointer {
                    variable: variable.to_string(),
                    path,
                })
            }
            other => Err(StatementError::UnknownValue(other.to_string())),
        }
    }
}

impl fmt::Display for PointerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointerValue::Null => write!(f, "NULL"),
            PointerValue::Alloc(op) => write!(f, "{}()", op.name()),
            PointerValue::Free(op) => write!(f, "{}()", op.name()),
            PointerValue::Pointer { variable, path } => {
                write!(f, "{}", variable)?;
                for field in path {
                    write!(f, ".{}", field)?;
                }
                Ok(())
            }
        }
    }
}

/// A statement, or the reason it could not be understood.
pub type Parsed = Result<Statement, StatementError>;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum OperationKind {
    /// Conditional: every branch body is visited.
    Branch,
    /// Loop: the body is visited once.
    Loop,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Branch {
    pub label: String,
    pub body: Vec<Parsed>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Operation {
    pub op: String,
    pub kind: OperationKind,
    pub branches: Vec<Branch>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Statement {
    /// `{variable}`
    Declare { variable: String },
    /// `{variable, value}`
    Assign { variable: String, value: PointerValue },
    /// `{variable, field}`: navigate `path`, then apply `value` to the slot reached.
    Field {
        variable: String,
        path: Vec<Field>,
        value: Option<PointerValue>,
    },
    /// `{operation}`
    Operation(Operation),
}

impl Statement {
    /// Parses one statement object. Keys other than the recognized ones (such as
    /// a row's `id`) are ignored.
    pub fn from_json(value: &Json) -> Result<Self, StatementError> {
        let obj = value.as_object().ok_or(StatementError::ExpectedObject("statement"))?;

        if let Some(operation) = obj.get("operation") {
            return parse_operation(operation).map(Statement::Operation);
        }

        if !obj.contains_key("variable") {
            return Err(StatementError::UnknownShape);
        }
        let variable = required_str(obj, "variable")?.to_string();

        if let Some(value) = obj.get("value") {
            let value = PointerValue::from_json(value)?;
            Ok(Statement::Assign { variable, value })
        } else if let Some(field) = obj.get("field") {
            let (path, value) = parse_path(field)?;
            Ok(Statement::Field { variable, path, value })
        } else {
            Ok(Statement::Declare { variable })
        }
    }

    /// The variable the statement acts on, if it acts on one.
    pub fn variable(&self) -> Option<&str> {
        match self {
            Statement::Declare { variable } | Statement::Assign { variable, .. } | Statement::Field { variable, .. } => {
                Some(variable.as_str())
            }
            Statement::Operation(_) => None,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Declare { variable } => write!(f, "declare {}", variable),
            Statement::Assign { variable, value } => write!(f, "{} = {}", variable, value),
            Statement::Field { variable, path, value } => {
                write!(f, "{}", variable)?;
                for field in path {
                    write!(f, ".{}", field)?;
                }
                if let Some(value) = value {
                    write!(f, " = {}", value)?;
                }
                Ok(())
            }
            Statement::Operation(op) => write!(f, "{} ({} branch(es))", op.op, op.branches.len()),
        }
    }
}

fn required_str<'a>(obj: &'a Map<String, Json>, key: &'static str) -> Result<&'a str, StatementError> {
    obj.get(key)
        .and_then(Json::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(StatementError::MissingField(key))
}

/// Parses a `{f, field?, value?, op?}` chain into its fields and the value at its end.
///
/// The innermost `value` (or `op`, when `value` is absent) wins.
fn parse_path(value: &Json) -> Result<(Vec<Field>, Option<PointerValue>), StatementError> {
    let obj = value.as_object().ok_or(StatementError::ExpectedObject("field"))?;
    let field: Field = required_str(obj, "f")?.parse()?;

    let own = match (obj.get("value"), obj.get("op")) {
        (Some(value), _) => Some(PointerValue::from_json(value)?),
        (None, Some(Json::String(op))) => Some(PointerValue::from_name(op)?),
        (None, Some(other)) => return Err(StatementError::UnknownValue(other.to_string())),
        (None, None) => None,
    };

    let mut path = vec![field];
    let value = match obj.get("field") {
        Some(nested) => {
            let (rest, inner) = parse_path(nested)?;
            path.extend(rest);
            inner.or(own)
        }
        None => own,
    };
    Ok((path, value))
}

fn parse_body(body: &Json) -> Vec<Parsed> {
    match body {
        Json::Array(items) => items.iter().map(Statement::from_json).collect(),
        other => vec![Statement::from_json(other)],
    }
}

fn parse_operation(value: &Json) -> Result<Operation, StatementError> {
    let obj = value.as_object().ok_or(StatementError::ExpectedObject("operation"))?;
    let op = required_str(obj, "op")?.to_string();

    if op == "loop" {
        if !obj.contains_key("condition") {
            return Err(StatementError::MissingField("condition"));
        }
        let body = obj.get("body").ok_or(StatementError::MissingField("body"))?;
        return Ok(Operation {
            op,
            kind: OperationKind::Loop,
            branches: vec![Branch {
                label: "body".to_string(),
                body: parse_body(body),
            }],
        });
    }

    let mut branches = Vec::new();
    for label in ["branch true", "branch false"] {
        let Some(branch) = obj.get(label) else {
            continue;
        };
        let body = match branch.as_object() {
            Some(branch) => branch.get("body").map(parse_body).unwrap_or_default(),
            None => vec![Err(StatementError::ExpectedObject("branch"))],
        };
        branches.push(Branch {
            label: label.to_string(),
            body,
        });
    }
    Ok(Operation {
        op,
        kind: OperationKind::Branch,
        branches,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_log::test;

    use super::*;

    #[test]
    fn test_assign_values() {
        let s = Statement::from_json(&json!({"id": 1, "variable": "p", "value": "malloc"})).unwrap();
        assert_eq!(
            s,
            Statement::Assign {
                variable: "p".into(),
                value: PointerValue::Alloc(AllocOp::Malloc)
            }
        );
        let s = Statement::from_json(&json!({"variable": "p", "value": null})).unwrap();
        assert!(matches!(s, Statement::Assign { value: PointerValue::Null, .. }));
        let s = Statement::from_json(&json!({"variable": "p", "value": "nullptr"})).unwrap();
        assert!(matches!(s, Statement::Assign { value: PointerValue::Null, .. }));
        let s = Statement::from_json(&json!({"variable": "p", "value": "delete[]"})).unwrap();
        assert!(matches!(s, Statement::Assign { value: PointerValue::Free(FreeOp::DeleteArray), .. }));
    }

    #[test]
    fn test_all_alloc_names_parse() {
        for op in AllocOp::ALL {
            assert_eq!(PointerValue::from_name(op.name()), Ok(PointerValue::Alloc(op)));
        }
        for op in FreeOp::ALL {
            assert_eq!(PointerValue::from_name(op.name()), Ok(PointerValue::Free(op)));
        }
    }

    #[test]
    fn test_unknown_value() {
        let err = Statement::from_json(&json!({"variable": "p", "value": "mmap"})).unwrap_err();
        assert_eq!(err, StatementError::UnknownValue("mmap".into()));
        let err = Statement::from_json(&json!({"variable": "p", "value": 42})).unwrap_err();
        assert_eq!(err, StatementError::UnknownValue("42".into()));
    }

    #[test]
    fn test_pointer_with_path() {
        let s = Statement::from_json(&json!({
            "variable": "a",
            "value": {"variable": "b", "field": {"f": "left", "field": {"f": "right"}}}
        }))
        .unwrap();
        let Statement::Assign { value, .. } = &s else {
            panic!("expected assignment, got {:?}", s);
        };
        assert_eq!(
            *value,
            PointerValue::Pointer {
                variable: "b".into(),
                path: vec![Field::Left, Field::Right]
            }
        );
        assert_eq!(s.to_string(), "a = b.left.right");
    }

    #[test]
    fn test_field_statement() {
        let s = Statement::from_json(&json!({"variable": "p", "field": {"f": "left", "value": "malloc"}})).unwrap();
        assert_eq!(
            s,
            Statement::Field {
                variable: "p".into(),
                path: vec![Field::Left],
                value: Some(PointerValue::Alloc(AllocOp::Malloc))
            }
        );

        let s = Statement::from_json(&json!({"variable": "p", "field": {"f": "right", "op": "free"}})).unwrap();
        assert!(matches!(s, Statement::Field { value: Some(PointerValue::Free(FreeOp::Free)), .. }));

        let s = Statement::from_json(&json!({"variable": "p", "field": {"f": "right"}})).unwrap();
        assert!(matches!(s, Statement::Field { value: None, .. }));
    }

    #[test]
    fn test_nested_field_value_innermost_wins() {
        let s = Statement::from_json(&json!({
            "variable": "p",
            "field": {"f": "left", "value": "free", "field": {"f": "left", "value": null}}
        }))
        .unwrap();
        assert_eq!(
            s,
            Statement::Field {
                variable: "p".into(),
                path: vec![Field::Left, Field::Left],
                value: Some(PointerValue::Null)
            }
        );
    }

    #[test]
    fn test_field_errors() {
        let err = Statement::from_json(&json!({"variable": "p", "field": {"f": "up"}})).unwrap_err();
        assert_eq!(err, StatementError::UnknownField("up".into()));
        let err = Statement::from_json(&json!({"variable": "p", "field": "left"})).unwrap_err();
        assert_eq!(err, StatementError::ExpectedObject("field"));
        let err = Statement::from_json(&json!({"variable": "p", "field": {}})).unwrap_err();
        assert_eq!(err, StatementError::MissingField("f"));
    }

    #[test]
    fn test_declare_and_shape_errors() {
        let s = Statement::from_json(&json!({"id": 3, "variable": "q"})).unwrap();
        assert_eq!(s, Statement::Declare { variable: "q".into() });
        assert_eq!(s.variable(), Some("q"));
        assert_eq!(Statement::from_json(&json!({"id": 3})), Err(StatementError::UnknownShape));
        assert_eq!(
            Statement::from_json(&json!({"variable": 5})),
            Err(StatementError::MissingField("variable"))
        );
        assert_eq!(Statement::from_json(&json!([1])), Err(StatementError::ExpectedObject("statement")));
    }

    #[test]
    fn test_branch_operation() {
        let s = Statement::from_json(&json!({
            "operation": {
                "op": "if",
                "branch true": {"body": [{"variable": "p", "value": "malloc"}, {"variable": "p", "value": "sbrk"}]},
                "branch false": {"body": {"variable": "p", "value": "free"}}
            }
        }))
        .unwrap();
        let Statement::Operation(op) = s else {
            panic!("expected operation");
        };
        assert_eq!(op.kind, OperationKind::Branch);
        assert_eq!(op.branches.len(), 2);
        assert_eq!(op.branches[0].label, "branch true");
        assert_eq!(op.branches[0].body.len(), 2);
        assert!(op.branches[0].body[1].is_err());
        assert_eq!(op.branches[1].body.len(), 1);
        assert!(op.branches[1].body[0].is_ok());
    }

    #[test]
    fn test_malformed_branch_is_local() {
        let s = Statement::from_json(&json!({
            "operation": {"op": "if", "branch true": 7, "branch false": {"body": []}}
        }))
        .unwrap();
        let Statement::Operation(op) = s else {
            panic!("expected operation");
        };
        assert_eq!(op.branches[0].body, vec![Err(StatementError::ExpectedObject("branch"))]);
        assert!(op.branches[1].body.is_empty());
    }

    #[test]
    fn test_loop_operation() {
        let s = Statement::from_json(&json!({
            "operation": {"op": "loop", "condition": "i < n", "body": {"variable": "p", "value": "malloc"}}
        }))
        .unwrap();
        let Statement::Operation(op) = s else {
            panic!("expected operation");
        };
        assert_eq!(op.kind, OperationKind::Loop);
        assert_eq!(op.branches.len(), 1);

        let err = Statement::from_json(&json!({"operation": {"op": "loop", "body": []}})).unwrap_err();
        assert_eq!(err, StatementError::MissingField("condition"));
        let err = Statement::from_json(&json!({"operation": {"op": "loop", "condition": true}})).unwrap_err();
        assert_eq!(err, StatementError::MissingField("body"));
        let err = Statement::from_json(&json!({"operation": {}})).unwrap_err();
        assert_eq!(err, StatementError::MissingField("op"));
    }
}
