use axum::extract::State;
use axum::http::header::HOST;
use axum::http::HeaderMap;
use axum::response::Html;

use crate::error::AppError;
use crate::state::AppState;

const INDEX_HTML: &str = r#"<!doctype html>
<html>
	<head>
		<meta charset="utf-8">
		<title>chatrelay</title>
	</head>
	<body>
		<form action="/login" method="get">
			<input type="text" name="name" placeholder="Your favourite streamer name">
			<input type="submit" value="Login using Twitch">
		</form>
	</body>
</html>
"#;

const STREAM_HTML: &str = r#"<!doctype html>
<html>
	<head>
		<meta charset="utf-8">
		<title>{{channel}} - chatrelay</title>
		<script>
			window.addEventListener("load", function() {
				var proto = document.location.protocol == "https:" ? "wss:" : "ws:";
				var ws = new WebSocket(proto + "//" + document.location.host + "/events");

				var chat = document.getElementById("chat");
				var events = document.getElementById("events");

				var line = function(text) {
					var d = document.createElement("div");
					d.textContent = text;
					return d;
				};

				ws.onmessage = function(e) {
					var frame = JSON.parse(e.data);
					if (frame.type == "message") {
						chat.appendChild(line(frame.content));
						chat.scrollTop = chat.scrollHeight;
						return;
					}
					if (events.childNodes.length >= 10) {
						events.removeChild(events.lastChild);
					}
					events.insertBefore(line("[" + frame.type + "] " + frame.content), events.firstChild);
				};
				ws.onclose = function() {
					console.log("disconnected");
				};
			});
		</script>
	</head>
	<body>
		<iframe
			src="https://player.twitch.tv/?channel={{channel}}&amp;parent={{parent}}&amp;muted=true"
			height="720"
			width="1280"
			frameborder="0"
			scrolling="no"
			allowfullscreen="true">
		</iframe>
		<div id="chat" style="overflow-y: scroll; height:720px; width:500px; display:inline-block; word-break: break-word;"></div>
		<div id="events" style="height:100px; width:500px; word-break: break-word;"></div>
	</body>
</html>
"#;

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Player plus live chat for the channel chosen at login.
pub async fn stream(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Html<String>, AppError> {
    let session = state.sessions.load(&headers);
    let channel = session
        .channel()
        .ok_or_else(|| AppError::validation("Choose a channel first."))?;

    // The embedded player refuses to load without the embedding host name.
    let parent = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(|host| host.rsplit_once(':').map_or(host, |(name, _)| name))
        .unwrap_or("localhost");

    Ok(Html(render_stream(channel, parent)))
}

fn render_stream(channel: &str, parent: &str) -> String {
    STREAM_HTML
        .replace("{{channel}}", &escape_html(channel))
        .replace("{{parent}}", &escape_html(parent))
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
