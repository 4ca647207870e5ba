use axum::{extract::State, response::Html};

use crate::web::helpers::html_escape;
use crate::web::server::AppState;

fn base_html(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title} - hugo-manager</title>
    <script src="https://unpkg.com/htmx.org@2.0.4"></script>
    <link rel="stylesheet" href="/static/style.css">
</head>
<body>
    <nav>
        <a href="/" class="nav-brand">hugo-manager</a>
    </nav>
    <main>
        {content}
    </main>
</body>
</html>"#
    )
}

fn status_card(state: &AppState) -> String {
    let (status, message) = state.manager.status();
    let port = state.manager.port();
    let pid = state
        .manager
        .pid()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "-".to_string());
    let message = html_escape(&message);
    let site_link = if status.is_running() {
        format!(r#"<a href="http://localhost:{port}/" target="_blank" class="btn btn-sm">Open site</a>"#)
    } else {
        String::new()
    };
    let actions = if status.can_start() {
        r#"<button hx-post="/api/hugo/start" hx-swap="none" class="btn btn-primary">Start</button>"#
    } else {
        r#"<button hx-post="/api/hugo/stop" hx-swap="none" class="btn">Stop</button>
        <button hx-post="/api/hugo/restart" hx-swap="none" class="btn">Restart</button>"#
    };

    format!(
        r#"<div id="hugo-status" class="card" hx-get="/_status" hx-trigger="every 2s, hugo-action from:body" hx-swap="outerHTML">
        <div class="status-line">
            <span class="status {status}">{status}</span>
            <span class="message">{message}</span>
        </div>
        <dl class="details">
            <dt>Port</dt><dd>{port}</dd>
            <dt>PID</dt><dd>{pid}</dd>
            <dt>Site</dt><dd><code>{dir}</code></dd>
        </dl>
        <div class="actions">{actions} {site_link}</div>
    </div>"#,
        dir = html_escape(&state.manager.project_dir().display().to_string()),
    )
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    let content = format!(
        r#"
        <div class="page-header">
            <h1>Hugo</h1>
        </div>
        {status}
        <div class="page-header">
            <h2>Output</h2>
            <label class="follow"><input type="checkbox" id="follow" checked> Follow</label>
        </div>
        <div class="log-viewer">
            <pre id="log-output"></pre>
        </div>
        <script>
            // Refresh the status card right after a button press
            document.body.addEventListener('htmx:afterRequest', function(evt) {{
                if (evt.detail.pathInfo.requestPath.startsWith('/api/hugo/')) {{
                    htmx.trigger(document.body, 'hugo-action');
                }}
            }});

            const output = document.getElementById('log-output');
            const follow = document.getElementById('follow');
            const source = new EventSource('/api/hugo/stream');
            source.addEventListener('log', function(e) {{
                const entry = JSON.parse(e.data);
                const line = document.createElement('div');
                line.className = 'log-line ' + entry.type;
                const time = document.createElement('span');
                time.className = 'time';
                time.textContent = new Date(entry.time).toLocaleTimeString();
                line.appendChild(time);
                line.appendChild(document.createTextNode(' ' + entry.message));
                output.appendChild(line);
                while (output.childElementCount > {max_lines}) {{
                    output.removeChild(output.firstElementChild);
                }}
                if (follow.checked) {{
                    output.scrollTop = output.scrollHeight;
                }}
            }});
        </script>
        "#,
        status = status_card(&state),
        max_lines = state.manager.config().log_capacity,
    );
    Html(base_html("Dashboard", &content))
}

pub async fn status_partial(State(state): State<AppState>) -> Html<String> {
    Html(status_card(&state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HugoConfig;
    use crate::hugo_status::HugoStatus;
    use crate::supervisor::HugoManager;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_status_card_escapes_and_offers_start() {
        let state = AppState {
            manager: Arc::new(HugoManager::new("/site/<b>", HugoConfig::default())),
            log_lines: 100,
        };
        let Html(card) = status_partial(State(state)).await;
        assert!(card.contains(r#"class="status stopped""#));
        assert!(card.contains("/api/hugo/start"));
        assert!(!card.contains("/api/hugo/stop"));
        assert!(card.contains("/site/&lt;b&gt;"));
        assert_eq!(HugoStatus::Stopped.to_string(), "stopped");
    }
}
