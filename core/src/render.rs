use crate::result::{StepResult, StepStatus, TestRunResult};
use comfy_table::{presets::ASCII_FULL, Table};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

/// JUnit-style XML: one testsuite per executed phase, one testcase per
/// leaf step.
pub fn render_junit(result: &TestRunResult) -> Result<String, String> {
    let bytes = write_junit(result).map_err(|err| format!("failed to render junit: {err}"))?;
    String::from_utf8(bytes).map_err(|err| format!("junit output is not utf-8: {err}"))
}

fn write_junit(result: &TestRunResult) -> std::io::Result<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut totals = (0usize, 0usize, 0usize);
    for outcome in result.phases.iter().filter(|o| o.executed()) {
        for step in &outcome.steps {
            for leaf in step.leaves() {
                totals.0 += 1;
                match leaf.status {
                    StepStatus::Fail => totals.1 += 1,
                    StepStatus::Skipped => totals.2 += 1,
                    StepStatus::Pass => {}
                }
            }
        }
    }

    let mut suites = BytesStart::new("testsuites");
    suites.push_attribute(("name", result.test_name.as_str()));
    suites.push_attribute(("tests", totals.0.to_string().as_str()));
    suites.push_attribute(("failures", totals.1.to_string().as_str()));
    suites.push_attribute(("skipped", totals.2.to_string().as_str()));
    suites.push_attribute(("time", format!("{:.3}", result.duration_ms / 1000.0).as_str()));
    suites.push_attribute(("timestamp", result.started_at.as_str()));
    writer.write_event(Event::Start(suites))?;

    for outcome in result.phases.iter().filter(|o| o.executed()) {
        let leaves: Vec<&StepResult> = outcome
            .steps
            .iter()
            .flat_map(|step| step.leaves())
            .collect();
        let failures = leaves
            .iter()
            .filter(|leaf| leaf.status == StepStatus::Fail)
            .count();
        let skipped = leaves
            .iter()
            .filter(|leaf| leaf.status == StepStatus::Skipped)
            .count();

        let mut suite = BytesStart::new("testsuite");
        suite.push_attribute(("name", outcome.phase.as_str()));
        suite.push_attribute(("tests", leaves.len().to_string().as_str()));
        suite.push_attribute(("failures", failures.to_string().as_str()));
        suite.push_attribute(("skipped", skipped.to_string().as_str()));
        writer.write_event(Event::Start(suite))?;

        if let Some(error) = &outcome.error {
            let mut element = BytesStart::new("error");
            element.push_attribute(("type", error.kind.as_str()));
            element.push_attribute(("message", error.message.as_str()));
            writer.write_event(Event::Empty(element))?;
        }

        for leaf in leaves {
            let case_name = format!("{} {}", leaf.label, leaf.name);
            let mut case = BytesStart::new("testcase");
            case.push_attribute(("name", case_name.as_str()));
            case.push_attribute(("classname", result.test_name.as_str()));
            case.push_attribute(("time", format!("{:.3}", leaf.duration_ms / 1000.0).as_str()));

            match leaf.status {
                StepStatus::Pass => {
                    writer.write_event(Event::Empty(case))?;
                }
                StepStatus::Skipped => {
                    writer.write_event(Event::Start(case))?;
                    writer.write_event(Event::Empty(BytesStart::new("skipped")))?;
                    writer.write_event(Event::End(BytesEnd::new("testcase")))?;
                }
                StepStatus::Fail => {
                    writer.write_event(Event::Start(case))?;
                    let mut failure = BytesStart::new("failure");
                    if let Some(error) = &leaf.error {
                        failure.push_attribute(("type", error.kind.as_str()));
                        failure.push_attribute(("message", error.message.as_str()));
                    }
                    writer.write_event(Event::Start(failure))?;
                    if let Some(error) = &leaf.error {
                        writer.write_event(Event::Text(BytesText::new(&error.message)))?;
                    }
                    writer.write_event(Event::End(BytesEnd::new("failure")))?;
                    writer.write_event(Event::End(BytesEnd::new("testcase")))?;
                }
            }
        }

        writer.write_event(Event::End(BytesEnd::new("testsuite")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("testsuites")))?;
    Ok(writer.into_inner())
}

pub fn render_html(result: &TestRunResult) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\" />\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\" />\n");
    html.push_str(&format!(
        "<title>{} report</title>\n",
        escape_html(&result.test_name)
    ));
    html.push_str("<style>");
    html.push_str(
        "body{font-family:system-ui,-apple-system,\"Segoe UI\",sans-serif;background:#0f172a;color:#e2e8f0;margin:0;padding:0;}\
        header{background:#1e293b;padding:24px 32px;border-bottom:1px solid rgba(148,163,184,0.2);}\
        h1{margin:0;font-size:28px;}\
        h2{margin-top:0;margin-bottom:12px;font-size:22px;}\
        main{padding:32px;}\
        section{margin-bottom:40px;background:#111c34;padding:24px;border-radius:12px;border:1px solid rgba(148,163,184,0.1);}\
        table{width:100%;border-collapse:collapse;margin-top:16px;font-size:14px;}\
        th,td{border:1px solid rgba(148,163,184,0.2);padding:8px 10px;text-align:left;}\
        th{background:#1e293b;font-weight:600;}\
        tr:nth-child(even){background:rgba(148,163,184,0.05);}\
        .pass{color:#4ade80;font-weight:600;}\
        .fail{color:#f87171;font-weight:600;}\
        .skipped{color:#94a3b8;font-weight:600;}\
        footer{padding:16px 32px;border-top:1px solid rgba(148,163,184,0.2);color:#94a3b8;font-size:13px;}",
    );
    html.push_str("</style>\n</head>\n<body>\n");
    html.push_str("<header>");
    html.push_str(&format!(
        "<h1>{}: <span class=\"{}\">{}</span></h1>",
        escape_html(&result.test_name),
        status_class(result.overall_status),
        result.overall_status
    ));
    html.push_str(&format!(
        "<p>Started {} &middot; {:.0} ms</p>",
        escape_html(&result.started_at),
        result.duration_ms
    ));
    html.push_str("</header>\n<main>\n");

    for outcome in &result.phases {
        html.push_str("<section>");
        html.push_str(&format!(
            "<h2>{} <span class=\"{}\">{}</span></h2>",
            escape_html(outcome.phase.as_str()),
            status_class(outcome.status),
            outcome.status
        ));
        if let Some(error) = &outcome.error {
            html.push_str(&format!(
                "<p class=\"fail\">{}</p>",
                escape_html(&error.to_string())
            ));
        }
        if outcome.steps.is_empty() {
            html.push_str("<p>No steps.</p>");
        } else {
            html.push_str("<table><thead><tr><th>Label</th><th>Step</th><th>Status</th><th>Duration</th><th>Detail</th></tr></thead><tbody>");
            for step in &outcome.steps {
                render_html_step(&mut html, step, 0);
            }
            html.push_str("</tbody></table>");
        }
        html.push_str("</section>\n");
    }

    html.push_str("</main>\n<footer>Generated by benchrun-core</footer>\n</body>\n</html>");
    html
}

fn render_html_step(html: &mut String, step: &StepResult, depth: usize) {
    let indent = "&nbsp;&nbsp;".repeat(depth);
    let name = if step.negative {
        format!("{} [NEGATIVE TEST]", step.name)
    } else {
        step.name.clone()
    };
    let detail = step
        .error
        .as_ref()
        .map(|error| error.to_string())
        .unwrap_or_default();
    html.push_str(&format!(
        "<tr><td>{}{}</td><td>{}{}</td><td class=\"{}\">{}</td><td>{:.0} ms</td><td>{}</td></tr>",
        indent,
        escape_html(&step.label),
        indent,
        escape_html(&name),
        status_class(step.status),
        step.status,
        step.duration_ms,
        escape_html(&detail)
    ));
    for child in &step.children {
        render_html_step(html, child, depth + 1);
    }
}

fn status_class(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Pass => "pass",
        StepStatus::Fail => "fail",
        StepStatus::Skipped => "skipped",
    }
}

fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

pub fn render_summary_table(result: &TestRunResult) -> String {
    let mut table = Table::new();
    table.load_preset(ASCII_FULL);
    table.set_header(vec!["phase", "status", "steps", "failed", "skipped"]);

    for outcome in &result.phases {
        let leaves: Vec<&StepResult> = outcome
            .steps
            .iter()
            .flat_map(|step| step.leaves())
            .collect();
        let failed = leaves
            .iter()
            .filter(|leaf| leaf.status == StepStatus::Fail)
            .count();
        let skipped = leaves
            .iter()
            .filter(|leaf| leaf.status == StepStatus::Skipped)
            .count();
        table.add_row(vec![
            outcome.phase.as_str().to_string(),
            outcome.status.to_string(),
            leaves.len().to_string(),
            failed.to_string(),
            skipped.to_string(),
        ]);
    }

    table.to_string()
}

/// Best-effort write of the run artifacts. Failures are warnings, never
/// run failures; the map only contains files that were written.
pub fn write_reports(result: &TestRunResult, dir: &Path) -> BTreeMap<String, PathBuf> {
    let mut written = BTreeMap::new();

    if let Err(err) = fs::create_dir_all(dir) {
        eprintln!("[warn] failed to create reports directory {:?}: {err}", dir);
        return written;
    }

    match serde_json::to_string_pretty(result) {
        Ok(json) => {
            let path = dir.join(format!("{}_result.json", result.test_name));
            if write_file(&path, &json) {
                written.insert("json".to_string(), path);
            }
        }
        Err(err) => eprintln!("[warn] failed to serialize run result: {err}"),
    }

    let html_path = dir.join(format!("{}_report.html", result.test_name));
    if write_file(&html_path, &render_html(result)) {
        written.insert("html".to_string(), html_path);
    }

    match render_junit(result) {
        Ok(xml) => {
            let path = dir.join(format!("{}_report.xml", result.test_name));
            if write_file(&path, &xml) {
                written.insert("xml".to_string(), path);
            }
        }
        Err(err) => eprintln!("[warn] {err}"),
    }

    written
}

fn write_file(path: &Path, contents: &str) -> bool {
    match fs::File::create(path) {
        Ok(mut file) => {
            if let Err(err) = file.write_all(contents.as_bytes()) {
                eprintln!("[warn] failed to write report {:?}: {err}", path);
                false
            } else {
                true
            }
        }
        Err(err) => {
            eprintln!("[warn] failed to create report {:?}: {err}", path);
            false
        }
    }
}
