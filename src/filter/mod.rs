//! Filter tree data model
//!
//! Defines the boolean predicate trees accepted by the compiler and the
//! native operator vocabulary of the target store. A node is either a leaf
//! (column + lookup + value) or a branch (connector + children); mixed nodes
//! are unrepresentable.

pub mod eval;
pub mod order;

use serde_json::Value;

/// Boolean connector for branch nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
}

impl Connector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
        }
    }

    /// De Morgan dual of this connector
    pub fn inverted(&self) -> Self {
        match self {
            Connector::And => Connector::Or,
            Connector::Or => Connector::And,
        }
    }
}

/// Lookup operators accepted at the filter interface.
///
/// The native subset (Eq/Lt/Lte/Gt/Gte) executes directly against the store;
/// In/IsNull/Range are exploded by the preprocessor; everything else is
/// emulated through a derived-value index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lookup {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    IsNull,
    Range,
    StartsWith,
    EndsWith,
    Contains,
    IExact,
    IContains,
    Regex,
    IRegex,
    Year,
    Month,
    Day,
    WeekDay,
    Hour,
    Minute,
    Second,
}

impl Lookup {
    /// Returns the lookup name as written at the query interface
    pub fn as_str(&self) -> &'static str {
        match self {
            Lookup::Eq => "exact",
            Lookup::Lt => "lt",
            Lookup::Lte => "lte",
            Lookup::Gt => "gt",
            Lookup::Gte => "gte",
            Lookup::In => "in",
            Lookup::IsNull => "isnull",
            Lookup::Range => "range",
            Lookup::StartsWith => "startswith",
            Lookup::EndsWith => "endswith",
            Lookup::Contains => "contains",
            Lookup::IExact => "iexact",
            Lookup::IContains => "icontains",
            Lookup::Regex => "regex",
            Lookup::IRegex => "iregex",
            Lookup::Year => "year",
            Lookup::Month => "month",
            Lookup::Day => "day",
            Lookup::WeekDay => "week_day",
            Lookup::Hour => "hour",
            Lookup::Minute => "minute",
            Lookup::Second => "second",
        }
    }

    /// Returns true if the store executes this lookup directly
    pub fn is_native(&self) -> bool {
        matches!(
            self,
            Lookup::Eq | Lookup::Lt | Lookup::Lte | Lookup::Gt | Lookup::Gte
        )
    }

    /// Returns true if the preprocessor explodes this lookup into native ones
    pub fn is_exploded(&self) -> bool {
        matches!(self, Lookup::In | Lookup::IsNull | Lookup::Range)
    }

    /// Returns true if this lookup requires a derived-value index
    pub fn is_emulated(&self) -> bool {
        !self.is_native() && !self.is_exploded()
    }

    /// Returns true if this is a date/time component lookup
    pub fn is_date_part(&self) -> bool {
        matches!(
            self,
            Lookup::Year
                | Lookup::Month
                | Lookup::Day
                | Lookup::WeekDay
                | Lookup::Hour
                | Lookup::Minute
                | Lookup::Second
        )
    }
}

/// Native comparison operators the store executes directly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl NativeOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            NativeOp::Eq => "=",
            NativeOp::Lt => "<",
            NativeOp::Lte => "<=",
            NativeOp::Gt => ">",
            NativeOp::Gte => ">=",
        }
    }

    /// Returns true if this operator counts against the store's
    /// one-inequality-column-per-query restriction
    pub fn is_inequality(&self) -> bool {
        !matches!(self, NativeOp::Eq)
    }

    /// Complement under negation: NOT (a < v) is (a >= v), and so on.
    /// Eq has no single-operator complement and is exploded instead.
    pub fn complement(&self) -> Option<Self> {
        match self {
            NativeOp::Eq => None,
            NativeOp::Lt => Some(NativeOp::Gte),
            NativeOp::Lte => Some(NativeOp::Gt),
            NativeOp::Gt => Some(NativeOp::Lte),
            NativeOp::Gte => Some(NativeOp::Lt),
        }
    }
}

/// A single native predicate in compiled output
#[derive(Debug, Clone, PartialEq)]
pub struct NativeLeaf {
    /// Column name (possibly a derived index column)
    pub column: String,
    /// Native comparison operator
    pub op: NativeOp,
    /// Comparison value
    pub value: Value,
}

impl NativeLeaf {
    pub fn new(column: impl Into<String>, op: NativeOp, value: Value) -> Self {
        Self {
            column: column.into(),
            op,
            value,
        }
    }
}

/// A leaf predicate in the input tree
#[derive(Debug, Clone, PartialEq)]
pub struct FilterLeaf {
    /// Column name
    pub column: String,
    /// Lookup operator
    pub lookup: Lookup,
    /// Literal being filtered by (scalar, list, or null)
    pub value: Value,
    /// Original uncompiled lookup name, kept for diagnostics
    pub lookup_name: String,
}

impl FilterLeaf {
    pub fn new(column: impl Into<String>, lookup: Lookup, value: Value) -> Self {
        Self {
            column: column.into(),
            lookup,
            value,
            lookup_name: lookup.as_str().to_string(),
        }
    }
}

/// A node in the filter tree
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    /// Internal node: connector plus one or more children
    Branch {
        connector: Connector,
        negated: bool,
        children: Vec<FilterNode>,
    },
    /// Leaf predicate
    Leaf(FilterLeaf),
}

impl FilterNode {
    /// Creates a leaf node
    pub fn leaf(column: impl Into<String>, lookup: Lookup, value: Value) -> Self {
        FilterNode::Leaf(FilterLeaf::new(column, lookup, value))
    }

    /// Creates an equality leaf
    pub fn eq(column: impl Into<String>, value: Value) -> Self {
        Self::leaf(column, Lookup::Eq, value)
    }

    /// Creates a less-than leaf
    pub fn lt(column: impl Into<String>, value: Value) -> Self {
        Self::leaf(column, Lookup::Lt, value)
    }

    /// Creates a greater-than leaf
    pub fn gt(column: impl Into<String>, value: Value) -> Self {
        Self::leaf(column, Lookup::Gt, value)
    }

    /// Creates a set-membership leaf
    pub fn is_in(column: impl Into<String>, values: Vec<Value>) -> Self {
        Self::leaf(column, Lookup::In, Value::Array(values))
    }

    /// Creates an isnull leaf
    pub fn isnull(column: impl Into<String>, want_null: bool) -> Self {
        Self::leaf(column, Lookup::IsNull, Value::Bool(want_null))
    }

    /// Creates a range leaf (inclusive bounds)
    pub fn range(column: impl Into<String>, lo: Value, hi: Value) -> Self {
        Self::leaf(column, Lookup::Range, Value::Array(vec![lo, hi]))
    }

    /// Creates an AND branch
    pub fn and(children: Vec<FilterNode>) -> Self {
        FilterNode::Branch {
            connector: Connector::And,
            negated: false,
            children,
        }
    }

    /// Creates an OR branch
    pub fn or(children: Vec<FilterNode>) -> Self {
        FilterNode::Branch {
            connector: Connector::Or,
            negated: false,
            children,
        }
    }

    /// Negates a node. Branches toggle their flag; a leaf is wrapped in a
    /// negated single-child AND branch.
    pub fn not(node: FilterNode) -> Self {
        match node {
            FilterNode::Branch {
                connector,
                negated,
                children,
            } => FilterNode::Branch {
                connector,
                negated: !negated,
                children,
            },
            leaf @ FilterNode::Leaf(_) => FilterNode::Branch {
                connector: Connector::And,
                negated: true,
                children: vec![leaf],
            },
        }
    }

    /// Validates structural invariants: every branch has at least one child.
    pub fn is_well_formed(&self) -> bool {
        match self {
            FilterNode::Leaf(_) => true,
            FilterNode::Branch { children, .. } => {
                !children.is_empty() && children.iter().all(FilterNode::is_well_formed)
            }
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Sort specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    /// Column to sort by
    pub column: String,
    /// Sort direction
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }
}
