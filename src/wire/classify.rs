//! Classification of captured operations as user traffic or cluster chatter.
//!
//! A command name alone is not enough: `getMore` carries both user cursor
//! continuation and oplog tailing, and the tailing conversation can dominate
//! a recording. The context-aware path joins the command with its database
//! and collection before deciding.

use super::inspect;

/// Databases used for internal MongoDB operations
pub fn is_internal_database(database: &str) -> bool {
    matches!(database, "local" | "admin" | "config")
}

/// Collections used for internal MongoDB operations
pub fn is_internal_collection(collection: &str) -> bool {
    collection.starts_with("system.")
        || matches!(
            collection,
            "oplog.rs"
                | "startup_log"
                | "replset.election"
                | "replset.minvalid"
                | "replset.oplogTruncateAfterPoint"
        )
}

/// Whether the message carries internal cluster chatter, judged by command
/// name alone.
///
/// `getMore` lands here because it is usually oplog tailing; the
/// context-aware [`is_likely_user_operation`] reclassifies the user-cursor
/// case.
pub fn is_internal_operation(message: &[u8]) -> bool {
    matches!(
        inspect::command_name(message).unwrap_or(""),
        "replSetHeartbeat"
            | "replSetGetStatus"
            | "replSetGetConfig"
            | "replSetUpdatePosition"
            | "getMore"
            | "hello"
            | "isMaster"
            | "ping"
            | "buildInfo"
            | "serverStatus"
            | "_configsvrCommitChunkMigration"
            | "_configsvrCommitChunkSplit"
            | "_shardsvrCloneCatalogData"
            | "_flushRoutingTableCacheUpdates"
    )
}

/// Whether the message carries a command users issue, judged by command name
/// alone (the simple filter path).
pub fn is_user_operation(message: &[u8]) -> bool {
    matches!(
        inspect::command_name(message).unwrap_or(""),
        // user data
        "insert" | "update" | "delete" | "find" | "findAndModify" | "aggregate" | "count"
            | "distinct"
            // DDL
            | "create" | "drop" | "createIndexes" | "dropIndexes" | "listIndexes" | "collMod"
            | "renameCollection"
            // admin commands users issue by hand
            | "explain" | "validate" | "compact" | "reIndex"
    )
}

/// Context-aware judgement of whether the message originates from
/// application traffic.
pub fn is_likely_user_operation(message: &[u8]) -> bool {
    let Some(command) = inspect::command_name(message) else {
        return false;
    };
    let database = inspect::database(message).unwrap_or("");
    let collection = inspect::collection(message).unwrap_or("");
    is_likely_user(command, database, collection)
}

/// The pure form of [`is_likely_user_operation`], over an already-extracted
/// (command, database, collection) tuple.
pub fn is_likely_user(command: &str, database: &str, collection: &str) -> bool {
    match command {
        // Writes and DDL are user traffic unless they target internal state;
        // inserts into system.sessions and friends are cluster bookkeeping.
        "insert" | "update" | "delete" | "findAndModify" | "create" | "drop" | "createIndexes"
        | "dropIndexes" => !is_internal_database(database) && !is_internal_collection(collection),

        // Driver discovery and replication heartbeats, regardless of target
        "hello" | "isMaster" | "ping" | "buildInfo" | "replSetHeartbeat" | "replSetGetStatus"
        | "replSetUpdatePosition" => false,

        // Reads carry two populations; the target decides
        "find" | "aggregate" | "count" | "distinct" | "getMore" | "listIndexes"
        | "listCollections" | "listDatabases" => {
            // getMore on the oplog is always replication
            if command == "getMore" && database == "local" && collection == "oplog.rs" {
                return false;
            }
            // User reads rarely target admin/local/config at all
            if is_internal_database(database) {
                return false;
            }
            true
        }

        // Unknown command: conservative default
        _ => false,
    }
}
