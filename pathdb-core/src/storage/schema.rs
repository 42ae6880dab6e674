use redb::TableDefinition;

/// Every entity lives in one ordered keyspace: `<id><suffix>`.
pub const TABLE_GRAPH: TableDefinition<&str, &[u8]> = TableDefinition::new("graph");

pub const TABLE_META: TableDefinition<&str, &str> = TableDefinition::new("meta");

pub const META_LAYOUT: &str = "layout";

pub const NODE_DATA_SUFFIX: &str = ":node:@data";
pub const EDGE_DATA_SUFFIX: &str = ":edge:@data";
pub const OUT_EDGE_SUFFIX: &str = ":@outedge";
pub const IN_EDGE_SUFFIX: &str = ":@inedge";

pub fn node_key(id: &str) -> String {
    with_suffix(id, NODE_DATA_SUFFIX)
}

pub fn edge_key(id: &str) -> String {
    with_suffix(id, EDGE_DATA_SUFFIX)
}

pub fn out_key(id: &str) -> String {
    with_suffix(id, OUT_EDGE_SUFFIX)
}

pub fn in_key(id: &str) -> String {
    with_suffix(id, IN_EDGE_SUFFIX)
}

pub fn with_suffix(id: &str, suffix: &str) -> String {
    let mut key = String::with_capacity(id.len() + suffix.len());
    key.push_str(id);
    key.push_str(suffix);
    key
}

/// Splits `key` back into its id when it carries `suffix`.
pub fn strip_suffix<'a>(key: &'a str, suffix: &str) -> Option<&'a str> {
    key.strip_suffix(suffix)
}
