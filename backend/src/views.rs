use shared::PredictionResult;

const INDEX_HTML: &str = include_str!("../templates/index.html");

pub fn render_index() -> &'static str {
    INDEX_HTML
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn render_list(html: &mut String, heading: &str, items: &[String]) {
    html.push_str(&format!("    <h2>{}</h2>\n    <ul>\n", escape_html(heading)));
    for item in items {
        html.push_str(&format!("        <li>{}</li>\n", escape_html(item)));
    }
    html.push_str("    </ul>\n");
}

pub fn render_result(result: &PredictionResult, file_name: &str) -> String {
    let label = escape_html(&result.label);
    let mut html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Result: {label}</title>
    <style>
        body {{ font-family: sans-serif; max-width: 40rem; margin: 3rem auto; padding: 0 1rem; }}
        img {{ max-width: 100%; image-rendering: pixelated; }}
    </style>
</head>
<body>
    <h1>Prediction: {label}</h1>
    <img src="/uploads/{src}" alt="{alt}">
"#,
        label = label,
        src = urlencoding::encode(file_name),
        alt = escape_html(file_name),
    );

    if let Some(precautions) = &result.precautions {
        render_list(&mut html, "Precautions", precautions);
    }
    if let Some(symptoms) = &result.symptoms {
        render_list(&mut html, "Symptoms", symptoms);
    }

    html.push_str("    <p><a href=\"/\">Upload another image</a></p>\n</body>\n</html>\n");
    html
}
