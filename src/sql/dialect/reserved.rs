//! Reserved words.
//!
//! A bare word found in a catalog column expression is treated as a column
//! name (and gets the table alias prefix) unless it is reserved. Generated
//! identifiers that collide with a reserved word are quoted.

/// Words reserved in every supported dialect.
pub const COMMON: &[&str] = &[
    "all", "alter", "and", "any", "as", "asc", "between", "by", "case", "cast", "check",
    "column", "constraint", "create", "cross", "current", "current_date", "current_time",
    "current_timestamp", "current_user", "default", "delete", "desc", "distinct", "drop",
    "else", "end", "except", "exists", "false", "fetch", "for", "foreign", "from", "full",
    "grant", "group", "having", "in", "inner", "insert", "intersect", "into", "is", "join",
    "left", "like", "not", "null", "of", "on", "or", "order", "outer", "primary",
    "references", "right", "select", "session_user", "set", "some", "table", "then", "to",
    "true", "union", "unique", "update", "user", "using", "values", "when", "where", "with",
];

pub const ORACLE: &[&str] = &[
    "access", "audit", "cluster", "comment", "compress", "connect", "date", "exclusive",
    "file", "identified", "immediate", "increment", "index", "initial", "level", "lock",
    "long", "maxextents", "minus", "mode", "modify", "noaudit", "nocompress", "nowait",
    "number", "offline", "online", "pctfree", "prior", "raw", "rename", "resource", "row",
    "rowid", "rownum", "rows", "share", "size", "start", "successful", "synonym",
    "sysdate", "trigger", "uid", "validate", "varchar", "varchar2", "view", "whenever",
];

pub const SQLSERVER: &[&str] = &[
    "backup", "break", "browse", "bulk", "cascade", "checkpoint", "clustered", "compute",
    "contains", "containstable", "continue", "database", "dbcc", "deny", "disk",
    "distributed", "dump", "errlvl", "escape", "exec", "execute", "exit", "file",
    "fillfactor", "freetext", "function", "goto", "holdlock", "identity", "identitycol",
    "if", "index", "key", "kill", "lineno", "load", "merge", "national", "nocheck",
    "nonclustered", "off", "offsets", "open", "option", "over", "percent", "pivot", "plan",
    "print", "proc", "procedure", "public", "raiserror", "read", "readtext", "reconfigure",
    "replication", "restore", "restrict", "return", "revert", "revoke", "rowcount",
    "rowguidcol", "rule", "save", "schema", "setuser", "shutdown", "statistics", "top",
    "tran", "transaction", "trigger", "truncate", "tsequal", "unpivot", "updatetext",
    "use", "view", "waitfor", "while", "writetext",
];

pub const MYSQL: &[&str] = &[
    "add", "analyze", "before", "bigint", "binary", "blob", "both", "call", "cascade",
    "change", "char", "character", "condition", "continue", "convert", "database",
    "databases", "dec", "decimal", "declare", "delayed", "describe", "div", "double",
    "dual", "each", "escaped", "exit", "explain", "float", "force", "function", "groups",
    "if", "ignore", "index", "infile", "int", "integer", "interval", "key", "keys", "kill",
    "lag", "lead", "leading", "leave", "limit", "lines", "load", "lock", "long", "loop",
    "match", "mod", "natural", "numeric", "optimize", "option", "out", "over", "partition",
    "procedure", "range", "rank", "read", "real", "regexp", "rename", "repeat", "replace",
    "require", "restrict", "return", "revoke", "rlike", "row", "rows", "schema", "separator",
    "show", "smallint", "spatial", "sql", "starting", "straight_join", "system", "terminated",
    "tinyint", "trailing", "trigger", "undo", "unlock", "unsigned", "usage", "use",
    "varchar", "while", "window", "write", "xor", "year_month", "zerofill",
];

pub const POSTGRES: &[&str] = &[
    "analyse", "analyze", "array", "asymmetric", "both", "collate", "deferrable", "do",
    "initially", "lateral", "leading", "limit", "localtime", "localtimestamp", "offset",
    "only", "placing", "returning", "symmetric", "trailing", "variadic", "window",
];

pub const SQLITE: &[&str] = &[
    "abort", "autoincrement", "conflict", "escape", "glob", "index", "indexed", "isnull",
    "limit", "natural", "notnull", "offset", "pragma", "raise", "regexp", "replace",
    "vacuum", "virtual",
];

/// Case-insensitive membership test.
pub fn contains(list: &[&str], word: &str) -> bool {
    list.iter().any(|w| w.eq_ignore_ascii_case(word))
}
