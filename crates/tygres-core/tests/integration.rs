//! End-to-end tests for the write pipeline: patching real files on disk,
//! routing declarations, and idempotence of repeated runs.

use std::fs;
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use tygres_core::{write_queries, AnalysedQuery, Field, WriteOptions};

fn field(name: &str, typescript: &str, not_null: bool, column: Option<&str>, gdesc: Option<&str>) -> Field {
    Field {
        name: name.to_string(),
        typescript: typescript.to_string(),
        not_null,
        column: column.map(|c| c.to_string()),
        gdesc: gdesc.map(|g| g.to_string()),
        comment: None,
    }
}

fn test_table_query(file: &Path, text: &str) -> AnalysedQuery {
    AnalysedQuery {
        file: file.to_path_buf(),
        sql: "select foo, bar from test_table".to_string(),
        text: text.to_string(),
        fields: vec![
            field("foo", "number", true, Some("public.test_table.foo"), Some("integer")),
            field("bar", "string", false, None, Some("text")),
        ],
        suggested_tags: vec!["TestTable".to_string()],
        comment: None,
    }
}

const EXPECTED_REGION: &str = "\
export declare namespace queries {
  /** - query: `select foo, bar from test_table` */
  export interface TestTable {
    /** column: `public.test_table.foo`, not null: `true`, regtype: `integer` */
    \"foo\": number

    /** regtype: `text` */
    \"bar\": string | null
  }
}
";

#[test]
fn test_patch_appends_region_and_rewrites_call_site() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("demo.ts");
    fs::write(
        &file,
        "import {sql} from '@x/client'\n\nexport const getTestTable = () => sql`select foo, bar from test_table`\n",
    )
    .unwrap();

    let queries = vec![test_table_query(&file, "sql`select foo, bar from test_table`")];
    let report = write_queries(&queries, &WriteOptions::new()).unwrap();
    assert_eq!(report.changed, vec![file.clone()]);

    let expected = format!(
        "import {{sql}} from '@x/client'\n\nexport const getTestTable = () => sql<queries.TestTable>`select foo, bar from test_table`\n\n{}",
        EXPECTED_REGION
    );
    assert_eq!(fs::read_to_string(&file).unwrap(), expected);
}

#[test]
fn test_rerun_with_stale_report_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("demo.ts");
    fs::write(
        &file,
        "import {sql} from '@x/client'\n\nexport const getTestTable = () => sql`select foo, bar from test_table`\n",
    )
    .unwrap();

    let queries = vec![test_table_query(&file, "sql`select foo, bar from test_table`")];
    write_queries(&queries, &WriteOptions::new()).unwrap();
    let first = fs::read_to_string(&file).unwrap();

    // The call site no longer matches the stale captured text, so it is left
    // alone; the region is replaced wholesale with identical content.
    let report = write_queries(&queries, &WriteOptions::new()).unwrap();
    assert!(report.is_clean());
    assert_eq!(fs::read_to_string(&file).unwrap(), first);
}

#[test]
fn test_rerun_after_reanalysis_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("demo.ts");
    fs::write(
        &file,
        "import {sql} from '@x/client'\n\nexport const getTestTable = () => sql`select foo, bar from test_table`\n",
    )
    .unwrap();

    let queries = vec![test_table_query(&file, "sql`select foo, bar from test_table`")];
    write_queries(&queries, &WriteOptions::new()).unwrap();
    let first = fs::read_to_string(&file).unwrap();

    // Re-analysis captures the call site as it now reads, type arguments
    // included. Patching again overwrites them with the same tag.
    let requeried = vec![test_table_query(
        &file,
        "sql<queries.TestTable>`select foo, bar from test_table`",
    )];
    let report = write_queries(&requeried, &WriteOptions::new()).unwrap();
    assert!(report.is_clean());
    assert_eq!(fs::read_to_string(&file).unwrap(), first);
}

#[test]
fn test_separate_destination_writes_module_and_import_once() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("demo.ts");
    fs::write(
        &file,
        "import {sql} from '@x/client'\n\nexport const getTestTable = () => sql`select foo, bar from test_table`\n",
    )
    .unwrap();

    let queries = vec![test_table_query(&file, "sql`select foo, bar from test_table`")];
    let resolver = |source: &Path| -> PathBuf {
        source.parent().unwrap().join("types").join(source.file_name().unwrap())
    };
    let options = WriteOptions::new().with_queries_module(resolver);
    write_queries(&queries, &options).unwrap();

    let source = fs::read_to_string(&file).unwrap();
    assert!(source.starts_with("import * as queries from './types/demo'\n"));
    assert!(source.contains("sql<queries.TestTable>`select foo, bar from test_table`"));
    assert!(!source.contains("export declare namespace"));

    let module = fs::read_to_string(dir.path().join("types/demo.ts")).unwrap();
    assert!(module.contains("export declare namespace queries {"));
    assert!(module.contains("export interface TestTable {"));

    // Re-running must not stack a second import line.
    let requeried = vec![test_table_query(
        &file,
        "sql<queries.TestTable>`select foo, bar from test_table`",
    )];
    let report = write_queries(&requeried, &options).unwrap();
    assert!(report.is_clean());
    assert_eq!(
        fs::read_to_string(&file).unwrap().matches("import * as queries").count(),
        1
    );
}

#[test]
fn test_sql_source_gets_companion_module_without_patching() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("list.sql");
    fs::write(&file, "select foo, bar from test_table\n").unwrap();

    let queries = vec![test_table_query(&file, "select foo, bar from test_table")];
    write_queries(&queries, &WriteOptions::new()).unwrap();

    // The .sql file itself is never touched.
    assert_eq!(
        fs::read_to_string(&file).unwrap(),
        "select foo, bar from test_table\n"
    );
    let module = fs::read_to_string(dir.path().join("__sql__/list.sql.ts")).unwrap();
    assert!(module.starts_with("/** Types for the queries in `list.sql`."));
    assert!(module.contains("export interface TestTable {"));
}

#[test]
fn test_tag_shared_across_files() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a.ts");
    let b = dir.path().join("b.ts");
    fs::write(&a, "export const x = () => sql`select foo, bar from test_table`\n").unwrap();
    fs::write(&b, "export const y = () => sql`select foo, bar from test_table where foo > 1`\n").unwrap();

    let mut second = test_table_query(&b, "sql`select foo, bar from test_table where foo > 1`");
    second.sql = "select foo, bar from test_table where foo > 1".to_string();
    let queries = vec![
        test_table_query(&a, "sql`select foo, bar from test_table`"),
        second,
    ];
    write_queries(&queries, &WriteOptions::new()).unwrap();

    let a_text = fs::read_to_string(&a).unwrap();
    let b_text = fs::read_to_string(&b).unwrap();
    assert!(a_text.contains("sql<queries.TestTable>`"));
    assert!(b_text.contains("sql<queries.TestTable>`"));
    assert!(b_text.contains("export interface TestTable {"));
}

#[test]
fn test_dry_run_reports_without_writing() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("demo.ts");
    let original = "export const x = () => sql`select foo, bar from test_table`\n";
    fs::write(&file, original).unwrap();

    let queries = vec![test_table_query(&file, "sql`select foo, bar from test_table`")];
    let options = WriteOptions::new().dry_run(true);
    let report = write_queries(&queries, &options).unwrap();

    assert!(!report.is_clean());
    assert_eq!(fs::read_to_string(&file).unwrap(), original);
}

#[test]
fn test_unanalysed_call_sites_survive_untouched() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("demo.ts");
    fs::write(
        &file,
        "const a = sql`select foo, bar from test_table`\nconst b = sql`select 1 as other`\n",
    )
    .unwrap();

    let queries = vec![test_table_query(&file, "sql`select foo, bar from test_table`")];
    write_queries(&queries, &WriteOptions::new()).unwrap();

    let text = fs::read_to_string(&file).unwrap();
    assert!(text.contains("sql<queries.TestTable>`select foo, bar from test_table`"));
    assert!(text.contains("const b = sql`select 1 as other`"));
}
