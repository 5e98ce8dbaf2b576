//! Task Graph service (C3): parses an annotated task list into a
//! [`TaskGraph`] and mutates it back to disk.

use std::path::Path;

use regex::Regex;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::task::DEFAULT_ROLE;
use crate::domain::models::{Task, TaskGraph};

/// Matches a task list line: `- [ ]`/`- [x]` followed by a title and
/// optional `@id(...)`/`@depends(a,b)`/`@role(...)` annotations.
fn task_line_re() -> Regex {
    Regex::new(r"^\s*-\s*\[( |x|X)\]\s*(.*)$").expect("static regex is valid")
}

fn annotation_re(name: &str) -> Regex {
    Regex::new(&format!(r"@{name}\(([^)]*)\)")).expect("static regex is valid")
}

/// Parse a line-oriented task list, per `spec.md` §4.3.
///
/// Lines that don't match the `- [ ]`/`- [x]` pattern are ignored (blank
/// lines, headings, prose). `@id`, `@depends`, `@role` annotations are
/// stripped out of the title text once parsed.
#[must_use]
pub fn parse(source: &str) -> TaskGraph {
    let line_re = task_line_re();
    let id_re = annotation_re("id");
    let depends_re = annotation_re("depends");
    let role_re = annotation_re("role");

    let mut tasks = Vec::new();
    let mut ordinal = 0usize;

    for line in source.lines() {
        let Some(caps) = line_re.captures(line) else { continue };
        ordinal += 1;

        let done = matches!(&caps[1], "x" | "X");
        let mut rest = caps[2].to_string();

        let id = id_re
            .captures(&rest)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_else(|| format!("task-{ordinal}"));

        let depends: Vec<String> = depends_re
            .captures(&rest)
            .and_then(|c| c.get(1))
            .map(|m| {
                m.as_str()
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let role = role_re
            .captures(&rest)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_else(|| DEFAULT_ROLE.to_string());

        for re in [&id_re, &depends_re, &role_re] {
            rest = re.replace_all(&rest, "").to_string();
        }
        let title = rest.trim().to_string();

        let mut task = Task::new(id, title);
        task.done = done;
        task.depends = depends;
        task.role = role;
        tasks.push(task);
    }

    TaskGraph::new(tasks)
}

/// Read and parse the task list at `project_path`.
pub async fn load(project_path: &Path) -> DomainResult<TaskGraph> {
    let source = tokio::fs::read_to_string(project_path).await?;
    Ok(parse(&source))
}

/// Mutate the task list's source text, replacing `[ ]` with `[x]` on
/// `task_id`'s line, and write it back atomically (write-to-temp then
/// rename) so a concurrent reader never observes a partially-written file.
pub async fn mark_done(project_path: &Path, task_id: &str) -> DomainResult<()> {
    let source = tokio::fs::read_to_string(project_path).await?;
    let id_re = annotation_re("id");
    let mut found = false;

    let mut ordinal = 0usize;
    let line_re = task_line_re();
    let mut out_lines = Vec::with_capacity(source.lines().count());

    for line in source.lines() {
        if let Some(caps) = line_re.captures(line) {
            ordinal += 1;
            let rest = &caps[2];
            let line_id = id_re
                .captures(rest)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_else(|| format!("task-{ordinal}"));

            if line_id == task_id {
                found = true;
                let replaced = line.replacen("[ ]", "[x]", 1);
                out_lines.push(replaced);
                continue;
            }
        }
        out_lines.push(line.to_string());
    }

    if !found {
        return Err(DomainError::TaskNotFound(task_id.to_string()));
    }

    let mut new_source = out_lines.join("\n");
    if source.ends_with('\n') {
        new_source.push('\n');
    }

    write_atomic(project_path, &new_source).await
}

async fn write_atomic(path: &Path, contents: &str) -> DomainResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("tasks.md");
    let tmp_path = dir.join(format!(".{file_name}.tmp-{}", uuid::Uuid::new_v4()));

    tokio::fs::write(&tmp_path, contents).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_annotations_and_strips_them_from_title() {
        let source = "- [ ] Build the API @id(a) @depends(b,c) @role(builder)\n- [x] Done thing @id(b)\n";
        let graph = parse(source);
        let a = graph.tasks.get("a").unwrap();
        assert_eq!(a.title, "Build the API");
        assert_eq!(a.depends, vec!["b".to_string(), "c".to_string()]);
        assert_eq!(a.role, "builder");
        assert!(!a.done);

        let b = graph.tasks.get("b").unwrap();
        assert!(b.done);
    }

    #[test]
    fn synthesizes_id_and_default_role_when_absent() {
        let source = "- [ ] First task\n- [ ] Second task\n";
        let graph = parse(source);
        assert!(graph.tasks.contains_key("task-1"));
        assert!(graph.tasks.contains_key("task-2"));
        assert_eq!(graph.tasks.get("task-1").unwrap().role, DEFAULT_ROLE);
    }

    #[test]
    fn non_task_lines_are_ignored() {
        let source = "# Heading\n\nSome prose.\n- [ ] Actual task @id(x)\n";
        let graph = parse(source);
        assert_eq!(graph.tasks.len(), 1);
    }

    #[tokio::test]
    async fn mark_done_flips_checkbox_and_preserves_other_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.md");
        tokio::fs::write(&path, "- [ ] A @id(a)\n- [ ] B @id(b)\n").await.unwrap();

        mark_done(&path, "b").await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents, "- [ ] A @id(a)\n- [x] B @id(b)\n");
    }

    #[tokio::test]
    async fn mark_done_unknown_id_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.md");
        tokio::fs::write(&path, "- [ ] A @id(a)\n").await.unwrap();

        let err = mark_done(&path, "missing").await.unwrap_err();
        assert!(matches!(err, DomainError::TaskNotFound(_)));
    }
}
