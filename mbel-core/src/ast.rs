use std::collections::BTreeMap;

/// Root of a parsed MBEL file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub statements: Vec<Statement>,
    /// Annotations extracted from `# AI_<Type>: value` comments, in source order.
    pub annotations: Vec<Annotation>,
    pub terms: BTreeMap<String, TermDefinition>,
    pub imports: Vec<String>,
}

impl Program {
    pub fn assignments(&self) -> impl Iterator<Item = &Assignment> {
        self.statements.iter().filter_map(|stmt| match stmt {
            Statement::Assign(assign) => Some(assign),
            _ => None,
        })
    }

    /// Annotations bound to the given (section-qualified) key.
    pub fn annotations_for<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Annotation> {
        self.annotations
            .iter()
            .filter(move |ann| ann.target.as_deref() == Some(key))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// `name = value` or `name(arg) { cases }`
    Assign(Assignment),
    /// `@key: value`
    Metadata(Metadata),
    /// `[name]`
    Section(Section),
    /// `@import namespace`
    Import(Import),
    /// `-name = "value"`
    Term(TermDefinition),
}

impl Statement {
    pub fn line(&self) -> u32 {
        match self {
            Statement::Assign(s) => s.line,
            Statement::Metadata(s) => s.line,
            Statement::Section(s) => s.line,
            Statement::Import(s) => s.line,
            Statement::Term(s) => s.line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub name: String,
    pub value: Expression,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub key: String,
    pub value: String,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub namespace: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermDefinition {
    /// Name without the leading `-`.
    pub name: String,
    pub value: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Str(String),
    Block(LogicBlockExpr),
    /// `{-name}`, left for the runtime to resolve.
    TermRef(String),
}

/// `name(argument) { [condition] => "value" ... }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicBlockExpr {
    pub argument: String,
    pub cases: Vec<Case>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case {
    pub condition: Condition,
    pub value: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `[one]`, `[male]`, `[other]`
    Keyword(String),
    /// `[0]`
    Exact(i64),
    /// `[2..4]`, both ends inclusive.
    Range { start: i64, end: i64 },
}

impl Condition {
    /// Key used for this condition in the compiled exact-match table.
    pub fn literal_key(&self) -> Option<String> {
        match self {
            Condition::Keyword(word) => Some(word.clone()),
            Condition::Exact(n) => Some(n.to_string()),
            Condition::Range { .. } => None,
        }
    }
}

/// Structured metadata from a `# AI_<Type>: value` comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// `Context`, `Tone`, `MaxLength`, ...
    pub kind: String,
    pub value: String,
    pub line: u32,
    /// Section-qualified key of the assignment that follows the comment.
    pub target: Option<String>,
}
