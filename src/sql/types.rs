//! JDBC-style column types.
//!
//! Every logical column and every bound variable carries one of these types.
//! The type decides how a bound literal is converted before execution, which
//! default aggregation a column gets, and how a result cell is serialized.
//! [`Aggregation`] names the closed set of aggregate functions a request or
//! catalog may ask for.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// JDBC type of a logical column or bound variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum JdbcType {
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Float,
    Double,
    Numeric,
    Decimal,
    Char,
    #[default]
    Varchar,
    NVarchar,
    LongVarchar,
    Clob,
    Date,
    Time,
    Timestamp,
    Binary,
    Blob,
    Xml,
}

impl JdbcType {
    /// Parse a JDBC type name, case-insensitive.
    ///
    /// Accepts the JDBC names (`VARCHAR`, `INTEGER`, ...) and a few common
    /// database spellings (`TEXT`, `NUMBER`, `DATETIME`).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_uppercase();
        let base = s.split('(').next().unwrap_or("").trim();
        let ty = match base {
            "BOOLEAN" | "BOOL" | "BIT" => JdbcType::Boolean,
            "TINYINT" => JdbcType::TinyInt,
            "SMALLINT" => JdbcType::SmallInt,
            "INTEGER" | "INT" => JdbcType::Integer,
            "BIGINT" => JdbcType::BigInt,
            "REAL" => JdbcType::Real,
            "FLOAT" => JdbcType::Float,
            "DOUBLE" | "DOUBLE PRECISION" => JdbcType::Double,
            "NUMERIC" | "NUMBER" => JdbcType::Numeric,
            "DECIMAL" => JdbcType::Decimal,
            "CHAR" | "NCHAR" => JdbcType::Char,
            "VARCHAR" | "VARCHAR2" | "TEXT" | "STRING" => JdbcType::Varchar,
            "NVARCHAR" | "NVARCHAR2" => JdbcType::NVarchar,
            "LONGVARCHAR" | "LONGNVARCHAR" => JdbcType::LongVarchar,
            "CLOB" | "NCLOB" => JdbcType::Clob,
            "DATE" => JdbcType::Date,
            "TIME" => JdbcType::Time,
            "TIMESTAMP" | "DATETIME" | "DATETIME2" => JdbcType::Timestamp,
            "BINARY" | "VARBINARY" | "LONGVARBINARY" => JdbcType::Binary,
            "BLOB" | "BYTEA" => JdbcType::Blob,
            "XML" | "SQLXML" => JdbcType::Xml,
            _ => return None,
        };
        Some(ty)
    }

    /// The JDBC type name, as written into the response header.
    pub fn name(&self) -> &'static str {
        match self {
            JdbcType::Boolean => "BOOLEAN",
            JdbcType::TinyInt => "TINYINT",
            JdbcType::SmallInt => "SMALLINT",
            JdbcType::Integer => "INTEGER",
            JdbcType::BigInt => "BIGINT",
            JdbcType::Real => "REAL",
            JdbcType::Float => "FLOAT",
            JdbcType::Double => "DOUBLE",
            JdbcType::Numeric => "NUMERIC",
            JdbcType::Decimal => "DECIMAL",
            JdbcType::Char => "CHAR",
            JdbcType::Varchar => "VARCHAR",
            JdbcType::NVarchar => "NVARCHAR",
            JdbcType::LongVarchar => "LONGVARCHAR",
            JdbcType::Clob => "CLOB",
            JdbcType::Date => "DATE",
            JdbcType::Time => "TIME",
            JdbcType::Timestamp => "TIMESTAMP",
            JdbcType::Binary => "BINARY",
            JdbcType::Blob => "BLOB",
            JdbcType::Xml => "XML",
        }
    }

    /// Returns true if this is a numeric type.
    pub fn is_numeric(&self) -> bool {
        self.is_integer()
            || matches!(
                self,
                JdbcType::Real
                    | JdbcType::Float
                    | JdbcType::Double
                    | JdbcType::Numeric
                    | JdbcType::Decimal
            )
    }

    /// Returns true if this is an integer type.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            JdbcType::TinyInt | JdbcType::SmallInt | JdbcType::Integer | JdbcType::BigInt
        )
    }

    /// Returns true if this is a character type (including CLOB).
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            JdbcType::Char
                | JdbcType::Varchar
                | JdbcType::NVarchar
                | JdbcType::LongVarchar
                | JdbcType::Clob
        )
    }

    /// Returns true for DATE, TIME and TIMESTAMP.
    pub fn is_temporal(&self) -> bool {
        matches!(self, JdbcType::Date | JdbcType::Time | JdbcType::Timestamp)
    }

    /// Returns true for binary types.
    pub fn is_binary(&self) -> bool {
        matches!(self, JdbcType::Binary | JdbcType::Blob)
    }

    /// Returns true if values of this type are compared as numbers.
    pub fn compares_numerically(&self) -> bool {
        self.is_numeric()
    }
}

impl fmt::Display for JdbcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for JdbcType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JdbcType::parse(s).ok_or_else(|| format!("unknown JDBC type: {}", s))
    }
}

impl TryFrom<String> for JdbcType {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<JdbcType> for String {
    fn from(t: JdbcType) -> Self {
        t.name().to_string()
    }
}

/// Aggregation applied to a logical column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Aggregation {
    /// Explicitly no aggregation, even in an aggregated select.
    None,
    Sum,
    Min,
    Max,
    Avg,
    Count,
    CountDistinct,
    /// `GROUPING(col)`: 1 when the column is rolled up in the current row.
    Grouping,
}

impl Aggregation {
    /// Parse the request/catalog spelling, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        let aggr = match s.trim().to_ascii_lowercase().as_str() {
            "none" => Aggregation::None,
            "sum" => Aggregation::Sum,
            "min" => Aggregation::Min,
            "max" => Aggregation::Max,
            "avg" => Aggregation::Avg,
            "count" => Aggregation::Count,
            "countdistinct" | "count_distinct" => Aggregation::CountDistinct,
            "grouping" => Aggregation::Grouping,
            _ => return None,
        };
        Some(aggr)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Aggregation::None => "none",
            Aggregation::Sum => "sum",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::Avg => "avg",
            Aggregation::Count => "count",
            Aggregation::CountDistinct => "countDistinct",
            Aggregation::Grouping => "grouping",
        }
    }

    /// SQL function name; `None` for [`Aggregation::None`].
    pub fn function_name(&self) -> Option<&'static str> {
        match self {
            Aggregation::None => None,
            Aggregation::Sum => Some("SUM"),
            Aggregation::Min => Some("MIN"),
            Aggregation::Max => Some("MAX"),
            Aggregation::Avg => Some("AVG"),
            Aggregation::Count | Aggregation::CountDistinct => Some("COUNT"),
            Aggregation::Grouping => Some("GROUPING"),
        }
    }

    /// Default aggregation for a column of type `ty`: `max` for text and
    /// temporal types, `sum` otherwise.
    pub fn default_for(ty: JdbcType) -> Self {
        if ty.is_textual() || ty.is_temporal() || ty.is_binary() || ty == JdbcType::Boolean {
            Aggregation::Max
        } else {
            Aggregation::Sum
        }
    }

    /// Type of the aggregated value.
    pub fn result_type(&self, input: JdbcType) -> JdbcType {
        match self {
            Aggregation::Count | Aggregation::CountDistinct => JdbcType::BigInt,
            Aggregation::Grouping => JdbcType::Integer,
            Aggregation::Avg => JdbcType::Double,
            _ => input,
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<String> for Aggregation {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Aggregation::parse(&s).ok_or_else(|| format!("unknown aggregation: {}", s))
    }
}

impl From<Aggregation> for String {
    fn from(a: Aggregation) -> Self {
        a.name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_jdbc_names() {
        assert_eq!(JdbcType::parse("VARCHAR"), Some(JdbcType::Varchar));
        assert_eq!(JdbcType::parse("integer"), Some(JdbcType::Integer));
        assert_eq!(JdbcType::parse("DECIMAL(18,2)"), Some(JdbcType::Decimal));
        assert_eq!(JdbcType::parse("timestamp"), Some(JdbcType::Timestamp));
        assert_eq!(JdbcType::parse("number"), Some(JdbcType::Numeric));
        assert_eq!(JdbcType::parse("varchar2(200)"), Some(JdbcType::Varchar));
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(JdbcType::parse("geometry"), None);
        assert_eq!(JdbcType::parse(""), None);
    }

    #[test]
    fn test_type_predicates() {
        assert!(JdbcType::BigInt.is_numeric());
        assert!(JdbcType::BigInt.is_integer());
        assert!(JdbcType::Decimal.is_numeric());
        assert!(!JdbcType::Decimal.is_integer());
        assert!(JdbcType::Clob.is_textual());
        assert!(JdbcType::Timestamp.is_temporal());
        assert!(!JdbcType::Varchar.is_numeric());
    }

    #[test]
    fn test_default_aggregation() {
        assert_eq!(Aggregation::default_for(JdbcType::Varchar), Aggregation::Max);
        assert_eq!(Aggregation::default_for(JdbcType::Timestamp), Aggregation::Max);
        assert_eq!(Aggregation::default_for(JdbcType::Decimal), Aggregation::Sum);
        assert_eq!(Aggregation::parse("countDistinct"), Some(Aggregation::CountDistinct));
        assert_eq!(Aggregation::parse("median"), None);
    }

    #[test]
    fn test_display_round_trip() {
        for ty in [JdbcType::Varchar, JdbcType::Numeric, JdbcType::Date, JdbcType::Blob] {
            assert_eq!(JdbcType::parse(&ty.to_string()), Some(ty));
        }
    }
}
