use crate::app::PageView;
use crate::utils::escape_html;

pub const TITLE: &str = "Financial Document Q&A System";

pub const EXAMPLE_QUESTIONS: [&str; 5] = [
    "What is Netflix's primary business?",
    "Where is Apple headquartered?",
    "What are the top risks mentioned in Johnson & Johnson's 10-K?",
    "Where are the primary suppliers for Tesla?",
    "How is ExxonMobil addressing climate change and the energy transition?",
];

const STYLE: &str = r#"
body { font-family: sans-serif; max-width: 960px; margin: 2rem auto; padding: 0 1rem; }
input[type=text], input[type=password] { width: 100%; padding: .5rem; box-sizing: border-box; }
.warning { background: #fff8e1; border-left: 4px solid #f0ad00; padding: .75rem; }
.error { background: #fdecea; border-left: 4px solid #d93025; padding: .75rem; white-space: pre-wrap; }
.answer { white-space: pre; font-family: monospace; }
#spinner { display: none; color: #555; }
footer { margin-top: 3rem; color: #777; }
"#;

/// Renders the whole single-page form for `view`.
pub fn render(view: &PageView) -> String {
    let mut body = String::new();

    body.push_str(&format!("<h1>📊 {}</h1>\n", escape_html(TITLE)));
    body.push_str(
        "<p>This application allows you to ask questions about companies based on their \
         SEC 10-K filings. The system uses a knowledge graph built from multiple companies' \
         filings to provide accurate and contextual answers.</p>\n",
    );

    body.push_str(&format!(
        r#"<form method="post" action="/key">
<label for="api_key">Enter your OpenAI API Key:</label>
<input type="password" id="api_key" name="api_key" value="" placeholder="{}" autocomplete="off">
<small>You can find your API key at <a href="https://platform.openai.com/api-keys">https://platform.openai.com/api-keys</a></small>
<button type="submit">Save key</button>
</form>
"#,
        if view.key_present { "••••••••" } else { "" }
    ));

    if let Some(warning) = &view.warning {
        body.push_str(&format!(
            "<div class=\"warning\">{}</div>\n",
            escape_html(warning)
        ));
    }

    if let Some(error) = &view.error {
        body.push_str(&format!("<div class=\"error\">{}</div>\n", escape_html(error)));
    }

    if view.question_enabled {
        body.push_str(&render_question_form(view));
    }

    body.push_str("<footer><hr>Built with Rust, Neo4j, and OpenAI</footer>\n");

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n<style>{}</style>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape_html(TITLE),
        STYLE,
        body
    )
}

fn render_question_form(view: &PageView) -> String {
    let mut html = format!(
        r#"<form method="post" action="/ask" onsubmit="document.getElementById('spinner').style.display='block'">
<label for="question">Enter your question about any company:</label>
<input type="text" id="question" name="question" value="{}" placeholder="e.g., What is Apple's business model? or What risks are mentioned by Tesla?">
<button type="submit">Ask</button>
</form>
<p id="spinner">Searching for relevant information...</p>
"#,
        escape_html(view.question.as_deref().unwrap_or(""))
    );

    html.push_str("<h3>Example Questions:</h3>\n<ul>\n");
    for question in EXAMPLE_QUESTIONS {
        html.push_str(&format!("<li>{}</li>\n", escape_html(question)));
    }
    html.push_str("</ul>\n");

    if let Some(answer) = &view.answer {
        html.push_str(&format!(
            "<h3>Answer:</h3>\n<div class=\"answer\">{}</div>\n",
            escape_html(answer)
        ));
    }

    html
}
