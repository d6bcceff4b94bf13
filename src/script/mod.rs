//! Administrative shell script generation.
//!
//! Translates recorded commands into executable `mongosh` statements. Every
//! statement selects its database explicitly via `getSiblingDB`, so the
//! script runs correctly regardless of the shell's current database.
//! Packets that cannot be translated become comment lines noting the packet
//! number and command.

use std::io::Write;

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{MongotapError, Result};
use crate::recording::Packet;
use crate::wire::Command;

/// Filters applied before translation
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScriptOptions {
    /// Only translate insert/update/delete/find/findAndModify
    pub crud_only: bool,

    /// Skip responses
    pub requests_only: bool,
}

/// Statistics about one generation run
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScriptStats {
    pub total_packets: u64,
    pub emitted: u64,
    pub skipped: u64,
    pub unparseable: u64,
}

const CRUD_COMMANDS: &[&str] = &["insert", "update", "delete", "find", "findAndModify"];

/// Translate a packet stream into a shell script
pub fn generate<I, W>(source: I, out: &mut W, options: &ScriptOptions) -> Result<ScriptStats>
where
    I: Iterator<Item = Result<Packet>>,
    W: Write,
{
    writeln!(out, "// MongoDB operations replay script")?;
    writeln!(out, "// Each operation selects its database via getSiblingDB")?;
    writeln!(out)?;

    let mut stats = ScriptStats::default();
    let mut notes: Vec<String> = Vec::new();

    for packet in source {
        let packet = packet?;
        stats.total_packets += 1;

        if options.requests_only && !packet.is_request() {
            stats.skipped += 1;
            continue;
        }
        let Some(command_name) = packet.command_name() else {
            stats.skipped += 1;
            continue;
        };
        if options.crud_only && !CRUD_COMMANDS.contains(&command_name) {
            stats.skipped += 1;
            continue;
        }
        let command_name = command_name.to_string();

        match Command::extract(&packet).and_then(|command| render(&command)) {
            Ok(script) => {
                writeln!(out, "{script}")?;
                writeln!(out)?;
                stats.emitted += 1;
            }
            Err(err) => {
                notes.push(format!(
                    "// packet {}: {} ({})",
                    stats.total_packets, command_name, err
                ));
                stats.unparseable += 1;
            }
        }
    }

    if !notes.is_empty() {
        writeln!(out, "// Operations that could not be translated:")?;
        for note in &notes {
            writeln!(out, "{note}")?;
        }
    }

    info!(
        packets = stats.total_packets,
        emitted = stats.emitted,
        unparseable = stats.unparseable,
        "script generated"
    );
    Ok(stats)
}

/// Render one extracted command as shell statements
pub fn render(command: &Command) -> Result<String> {
    let db = &command.database;
    let doc = &command.document;
    match command.name.as_str() {
        "insert" => render_insert(db, doc),
        "update" => render_update(db, doc),
        "delete" => render_delete(db, doc),
        "find" => render_find(db, doc),
        "aggregate" => render_aggregate(db, doc),
        "findAndModify" => render_find_and_modify(db, doc),
        "createIndexes" => render_create_indexes(db, doc),
        "dropIndexes" => render_drop_indexes(db, doc),
        "create" => render_create(db, doc),
        "drop" => render_drop(db, doc),
        _ => render_run_command(db, doc),
    }
}

fn collection_of<'a>(doc: &'a Document, key: &str) -> Result<&'a str> {
    doc.get_str(key)
        .map_err(|_| MongotapError::malformed_bson(format!("{key} carries no collection name")))
}

fn json(value: &Bson) -> Result<String> {
    serde_json::to_string_pretty(&value.clone().into_relaxed_extjson())
        .map_err(|err| MongotapError::malformed_bson(err.to_string()))
}

fn json_compact(value: &Bson) -> Result<String> {
    serde_json::to_string(&value.clone().into_relaxed_extjson())
        .map_err(|err| MongotapError::malformed_bson(err.to_string()))
}

fn json_doc(doc: &Document) -> Result<String> {
    json(&Bson::Document(doc.clone()))
}

fn render_insert(db: &str, doc: &Document) -> Result<String> {
    let coll = collection_of(doc, "insert")?;
    let documents = doc
        .get_array("documents")
        .map_err(|_| MongotapError::malformed_bson("insert carries no documents array"))?;

    let mut lines = Vec::with_capacity(documents.len());
    for document in documents {
        lines.push(format!(
            "db.getSiblingDB(\"{db}\").{coll}.insertOne({});",
            json(document)?
        ));
    }
    Ok(lines.join("\n"))
}

fn render_update(db: &str, doc: &Document) -> Result<String> {
    let coll = collection_of(doc, "update")?;
    let updates = doc
        .get_array("updates")
        .map_err(|_| MongotapError::malformed_bson("update carries no updates array"))?;

    let empty = Bson::Document(Document::new());
    let mut lines = Vec::new();
    for entry in updates {
        let Bson::Document(update) = entry else {
            continue;
        };
        let filter = json(update.get("q").unwrap_or(&empty))?;
        let change = json(update.get("u").unwrap_or(&empty))?;
        let method = if update.get_bool("multi").unwrap_or(false) {
            "updateMany"
        } else {
            "updateOne"
        };
        lines.push(format!(
            "db.getSiblingDB(\"{db}\").{coll}.{method}(\n  {filter},\n  {change}\n);"
        ));
    }
    Ok(lines.join("\n"))
}

fn render_delete(db: &str, doc: &Document) -> Result<String> {
    let coll = collection_of(doc, "delete")?;
    let deletes = doc
        .get_array("deletes")
        .map_err(|_| MongotapError::malformed_bson("delete carries no deletes array"))?;

    let empty = Bson::Document(Document::new());
    let mut lines = Vec::new();
    for entry in deletes {
        let Bson::Document(delete) = entry else {
            continue;
        };
        let filter = json(delete.get("q").unwrap_or(&empty))?;
        // limit 1 = deleteOne, limit 0 = deleteMany
        let one = matches!(delete.get("limit"), Some(Bson::Int32(1)) | Some(Bson::Int64(1)));
        let method = if one { "deleteOne" } else { "deleteMany" };
        lines.push(format!(
            "db.getSiblingDB(\"{db}\").{coll}.{method}({filter});"
        ));
    }
    Ok(lines.join("\n"))
}

fn render_find(db: &str, doc: &Document) -> Result<String> {
    let coll = collection_of(doc, "find")?;
    let empty = Bson::Document(Document::new());
    let filter = json(doc.get("filter").unwrap_or(&empty))?;

    let mut script = format!("db.getSiblingDB(\"{db}\").{coll}.find({filter})");
    if let Ok(projection) = doc.get_document("projection") {
        if !projection.is_empty() {
            script.push_str(&format!(".project({})", json_doc(projection)?));
        }
    }
    if let Ok(sort) = doc.get_document("sort") {
        if !sort.is_empty() {
            script.push_str(&format!(".sort({})", json_doc(sort)?));
        }
    }
    if let Some(limit) = doc.get("limit") {
        script.push_str(&format!(".limit({})", json_compact(limit)?));
    }
    script.push(';');
    Ok(script)
}

fn render_aggregate(db: &str, doc: &Document) -> Result<String> {
    let coll = collection_of(doc, "aggregate")?;
    let pipeline = doc
        .get_array("pipeline")
        .map_err(|_| MongotapError::malformed_bson("aggregate carries no pipeline"))?;
    Ok(format!(
        "db.getSiblingDB(\"{db}\").{coll}.aggregate({});",
        json(&Bson::Array(pipeline.clone()))?
    ))
}

fn render_find_and_modify(db: &str, doc: &Document) -> Result<String> {
    let coll = collection_of(doc, "findAndModify")?.to_string();
    let mut args = doc.clone();
    args.remove("findAndModify");
    Ok(format!(
        "db.getSiblingDB(\"{db}\").{coll}.findAndModify({});",
        json_doc(&args)?
    ))
}

fn render_create_indexes(db: &str, doc: &Document) -> Result<String> {
    let coll = collection_of(doc, "createIndexes")?;
    let indexes = doc
        .get_array("indexes")
        .map_err(|_| MongotapError::malformed_bson("createIndexes carries no indexes array"))?;

    let empty = Bson::Document(Document::new());
    let mut lines = Vec::new();
    for entry in indexes {
        let Bson::Document(index) = entry else {
            continue;
        };
        let key = json(index.get("key").unwrap_or(&empty))?;

        let mut options = Document::new();
        if let Ok(name) = index.get_str("name") {
            options.insert("name", name);
        }
        if index.get_bool("unique").unwrap_or(false) {
            options.insert("unique", true);
        }

        if options.is_empty() {
            lines.push(format!(
                "db.getSiblingDB(\"{db}\").{coll}.createIndex({key});"
            ));
        } else {
            lines.push(format!(
                "db.getSiblingDB(\"{db}\").{coll}.createIndex({key}, {});",
                json_doc(&options)?
            ));
        }
    }
    Ok(lines.join("\n"))
}

fn render_drop_indexes(db: &str, doc: &Document) -> Result<String> {
    let coll = collection_of(doc, "dropIndexes")?;
    let index = doc.get("index").cloned().unwrap_or(Bson::String("*".to_string()));
    Ok(format!(
        "db.getSiblingDB(\"{db}\").{coll}.dropIndex({});",
        json_compact(&index)?
    ))
}

fn render_create(db: &str, doc: &Document) -> Result<String> {
    let coll = collection_of(doc, "create")?;
    Ok(format!(
        "db.getSiblingDB(\"{db}\").createCollection(\"{coll}\");"
    ))
}

fn render_drop(db: &str, doc: &Document) -> Result<String> {
    let coll = collection_of(doc, "drop")?;
    Ok(format!("db.getSiblingDB(\"{db}\").{coll}.drop();"))
}

fn render_run_command(db: &str, doc: &Document) -> Result<String> {
    Ok(format!(
        "db.getSiblingDB(\"{db}\").runCommand({});",
        json_doc(doc)?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn command(database: &str, name: &str, document: Document) -> Command {
        Command {
            database: database.to_string(),
            name: name.to_string(),
            document,
        }
    }

    #[test]
    fn test_render_insert() {
        let cmd = command(
            "app",
            "insert",
            doc! { "insert": "users", "documents": [{ "_id": 1, "name": "A" }] },
        );
        let script = render(&cmd).unwrap();
        assert!(script.starts_with("db.getSiblingDB(\"app\").users.insertOne("));
        assert!(script.contains("\"_id\": 1"));
        assert!(script.contains("\"name\": \"A\""));
        assert!(script.ends_with(");"));
    }

    #[test]
    fn test_render_insert_one_statement_per_document() {
        let cmd = command(
            "app",
            "insert",
            doc! { "insert": "users", "documents": [{ "_id": 1 }, { "_id": 2 }] },
        );
        let script = render(&cmd).unwrap();
        assert_eq!(script.matches("insertOne").count(), 2);
    }

    #[test]
    fn test_render_update_one_vs_many() {
        let cmd = command(
            "app",
            "update",
            doc! {
                "update": "users",
                "updates": [
                    { "q": { "a": 1 }, "u": { "$set": { "b": 2 } }, "multi": true },
                    { "q": { "a": 2 }, "u": { "$set": { "b": 3 } } },
                ],
            },
        );
        let script = render(&cmd).unwrap();
        assert!(script.contains("updateMany"));
        assert!(script.contains("updateOne"));
        assert!(script.contains("$set"));
    }

    #[test]
    fn test_render_delete_limits() {
        let cmd = command(
            "app",
            "delete",
            doc! {
                "delete": "users",
                "deletes": [
                    { "q": { "a": 1 }, "limit": 1 },
                    { "q": {}, "limit": 0 },
                ],
            },
        );
        let script = render(&cmd).unwrap();
        assert!(script.contains("deleteOne"));
        assert!(script.contains("deleteMany"));
    }

    #[test]
    fn test_render_find_chains_modifiers() {
        let cmd = command(
            "shop",
            "find",
            doc! {
                "find": "orders",
                "filter": { "total": { "$gt": 100 } },
                "projection": { "total": 1 },
                "sort": { "total": -1 },
                "limit": 5,
            },
        );
        let script = render(&cmd).unwrap();
        assert!(script.starts_with("db.getSiblingDB(\"shop\").orders.find("));
        let find_pos = script.find(".find(").unwrap();
        let project_pos = script.find(".project(").unwrap();
        let sort_pos = script.find(".sort(").unwrap();
        let limit_pos = script.find(".limit(5)").unwrap();
        assert!(find_pos < project_pos && project_pos < sort_pos && sort_pos < limit_pos);
    }

    #[test]
    fn test_render_find_bare() {
        let cmd = command("shop", "find", doc! { "find": "orders" });
        let script = render(&cmd).unwrap();
        assert_eq!(script, "db.getSiblingDB(\"shop\").orders.find({});");
    }

    #[test]
    fn test_render_aggregate() {
        let cmd = command(
            "shop",
            "aggregate",
            doc! { "aggregate": "sales", "pipeline": [{ "$match": { "region": "eu" } }] },
        );
        let script = render(&cmd).unwrap();
        assert!(script.contains(".sales.aggregate("));
        assert!(script.contains("$match"));
    }

    #[test]
    fn test_render_find_and_modify_removes_command_field() {
        let cmd = command(
            "app",
            "findAndModify",
            doc! { "findAndModify": "jobs", "query": { "state": "new" }, "update": { "$set": { "state": "run" } } },
        );
        let script = render(&cmd).unwrap();
        assert!(script.contains(".jobs.findAndModify("));
        assert!(!script.contains("\"findAndModify\""));
        assert!(script.contains("\"query\""));
    }

    #[test]
    fn test_render_create_indexes() {
        let cmd = command(
            "app",
            "createIndexes",
            doc! {
                "createIndexes": "users",
                "indexes": [
                    { "key": { "email": 1 }, "name": "email_1", "unique": true },
                    { "key": { "age": -1 } },
                ],
            },
        );
        let script = render(&cmd).unwrap();
        assert!(script.contains("\"unique\": true"));
        assert!(script.contains("\"name\": \"email_1\""));
        assert_eq!(script.matches("createIndex(").count(), 2);
    }

    #[test]
    fn test_render_ddl_and_fallback() {
        let create = command("app", "create", doc! { "create": "events" });
        assert_eq!(
            render(&create).unwrap(),
            "db.getSiblingDB(\"app\").createCollection(\"events\");"
        );

        let drop = command("app", "drop", doc! { "drop": "events" });
        assert_eq!(
            render(&drop).unwrap(),
            "db.getSiblingDB(\"app\").events.drop();"
        );

        let drop_index = command(
            "app",
            "dropIndexes",
            doc! { "dropIndexes": "users", "index": "email_1" },
        );
        assert_eq!(
            render(&drop_index).unwrap(),
            "db.getSiblingDB(\"app\").users.dropIndex(\"email_1\");"
        );

        let other = command("admin", "setParameter", doc! { "setParameter": 1, "logLevel": 2 });
        let script = render(&other).unwrap();
        assert!(script.starts_with("db.getSiblingDB(\"admin\").runCommand("));
        assert!(script.contains("logLevel"));
    }

    #[test]
    fn test_render_insert_without_documents_fails() {
        let cmd = command("app", "insert", doc! { "insert": "users" });
        assert!(matches!(
            render(&cmd),
            Err(MongotapError::MalformedBson(_))
        ));
    }
}
