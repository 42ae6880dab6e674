use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relop {
    Less,
    Equal,
    Greater,
}

impl fmt::Display for Relop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Relop::Less => "<",
            Relop::Equal => "=",
            Relop::Greater => ">",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Unescaped contents of a quoted string.
    String(String),
    /// Source text of a number, converted once the field type is known.
    Number(String),
}

impl Literal {
    pub fn text(&self) -> &str {
        match self {
            Literal::String(s) | Literal::Number(s) => s,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "{s:?}"),
            Literal::Number(n) => f.write_str(n),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub relop: Relop,
    pub literal: Literal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `<-[...]-`
    Prev,
    /// `-[...]->`
    Next,
    /// `-[...]-`
    Bidirection,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodePattern {
    pub variable: Option<String>,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgePattern {
    pub variable: Option<String>,
    pub direction: Direction,
    pub properties: Vec<Property>,
}

/// One element of the alternating path.
#[derive(Debug, Clone, Copy)]
pub enum PatternRef<'a> {
    Node(&'a NodePattern),
    Edge(&'a EdgePattern),
}

impl<'a> PatternRef<'a> {
    pub fn variable(&self) -> Option<&'a str> {
        match self {
            PatternRef::Node(n) => n.variable.as_deref(),
            PatternRef::Edge(e) => e.variable.as_deref(),
        }
    }

    pub fn properties(&self) -> &'a [Property] {
        match self {
            PatternRef::Node(n) => &n.properties,
            PatternRef::Edge(e) => &e.properties,
        }
    }

    /// The literal of an `id = literal` predicate, which pins the element.
    pub fn direct_id(&self) -> Option<&'a str> {
        self.properties()
            .iter()
            .find(|p| p.name == "id" && p.relop == Relop::Equal)
            .map(|p| p.literal.text())
    }
}

/// Path `node (edge node)*`; position `2i` is node `i`, `2i + 1` is edge `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectClause {
    pub nodes: Vec<NodePattern>,
    pub edges: Vec<EdgePattern>,
}

impl SelectClause {
    /// Number of path positions, `2N - 1` for `N` nodes.
    pub fn len(&self) -> usize {
        self.nodes.len() + self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn position(&self, index: usize) -> PatternRef<'_> {
        if index % 2 == 0 {
            PatternRef::Node(&self.nodes[index / 2])
        } else {
            PatternRef::Edge(&self.edges[index / 2])
        }
    }

    /// Path position bound to `variable`.
    pub fn position_of(&self, variable: &str) -> Option<usize> {
        (0..self.len()).find(|&i| self.position(i).variable() == Some(variable))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnClause {
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphQuery {
    pub select: SelectClause,
    pub returns: ReturnClause,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prop(name: &str, relop: Relop, literal: Literal) -> Property {
        Property {
            name: name.into(),
            relop,
            literal,
        }
    }

    #[test]
    fn positions_alternate_between_nodes_and_edges() {
        let select = SelectClause {
            nodes: vec![
                NodePattern {
                    variable: Some("a".into()),
                    properties: vec![prop("id", Relop::Equal, Literal::String("A".into()))],
                },
                NodePattern::default(),
            ],
            edges: vec![EdgePattern {
                variable: Some("e".into()),
                direction: Direction::Next,
                properties: vec![prop("id", Relop::Greater, Literal::Number("1".into()))],
            }],
        };

        assert_eq!(select.len(), 3);
        assert!(matches!(select.position(1), PatternRef::Edge(_)));
        assert_eq!(select.position(0).direct_id(), Some("A"));
        assert_eq!(select.position(1).direct_id(), None);
        assert_eq!(select.position_of("e"), Some(1));
        assert_eq!(select.position_of("zz"), None);
    }
}
