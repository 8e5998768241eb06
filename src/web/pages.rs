use axum::{
    extract::State,
    http::header,
    response::{Html, IntoResponse},
};
use tracing::warn;

use super::SharedState;
use crate::session::PlayerSnapshot;

/// Index page: recorded events plus the camera dialog
pub async fn index_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let events = match state.frames.list_events().await {
        Ok(events) => events,
        Err(e) => {
            warn!("⚠️ Could not list events: {}", e);
            Vec::new()
        }
    };
    Html(generate_index_html(&events))
}

/// Serve CSS styles
pub async fn serve_css() -> impl IntoResponse {
    let css = r#"
* { margin: 0; padding: 0; box-sizing: border-box; }
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #f5f5f5; }
.container { max-width: 100%; margin: 0 auto; padding: 20px 40px; }
.header { background: #2d3748; color: white; padding: 24px 0; text-align: center; margin-bottom: 24px; }
.panel { background: white; border-radius: 12px; box-shadow: 0 4px 6px rgba(0,0,0,0.1); padding: 24px; margin-bottom: 24px; }
.event-table { width: 100%; border-collapse: collapse; }
.event-table td { padding: 12px; border-bottom: 1px solid #e1e5e9; }
.event-table tr.unread td { font-weight: 600; }
.btn { background: #667eea; color: white; border: none; padding: 8px 16px; border-radius: 6px; cursor: pointer; margin: 2px; text-decoration: none; display: inline-block; font-size: 14px; }
.btn:hover { background: #5a67d8; }
.btn-danger { background: #e53e3e; }
.player img { display: block; max-width: 100%; margin-bottom: 12px; }
.player input[type=range] { width: 100%; margin-bottom: 12px; }
.camera-form label { display: block; margin-top: 8px; }
.camera-form input { width: 100%; padding: 6px; }
.tips { color: #742a2a; min-height: 1.2em; margin-bottom: 8px; }
"#;
    ([(header::CONTENT_TYPE, "text/css")], css)
}

pub fn generate_index_html(events: &[String]) -> String {
    let rows: String = events
        .iter()
        .map(|event| {
            format!(
                r#"
                <tr id="{event}" class="unread">
                    <td>{event}</td>
                    <td>
                        <a href="/events/{event}/play" class="btn" onclick="markEventRead('{event}')">▶ Play</a>
                        <button class="btn btn-danger" onclick="deleteEvent('{event}')">Delete</button>
                    </td>
                </tr>"#,
                event = event
            )
        })
        .collect();

    format!(
        r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Camwatch Console</title>
    <link rel="stylesheet" href="/static/style.css">
</head>
<body>
    <div class="header"><h1>Camwatch Console</h1></div>
    <div class="container">
        <div class="panel">
            <h2>Recorded events ({count})</h2>
            {empty}
            <table class="event-table"><tbody>{rows}</tbody></table>
        </div>

        <div class="panel camera-form">
            <h2>Camera source</h2>
            <p class="tips" id="tips"></p>
            <form id="camera-form">
                <input type="hidden" name="key" id="cam_key">
                <label>Name <input name="name" id="cam_name"></label>
                <label>Source URL <input name="url" id="cam_url"></label>
                <label>Enabled <input name="enabled" id="cam_enabled" value="1"></label>
                <label>Max frame rate (normal) <input name="poll_max_fps" id="cam_poll_max_fps" value="1"></label>
                <label>Max frame rate (alert) <input name="alert_max_fps" id="cam_alert_max_fps" value="10"></label>
                <label>Seconds after alert <input name="num_secs_after" id="cam_num_secs_after" value="2"></label>
            </form>
            <button class="btn" onclick="saveCamera()">Save</button>
            <button class="btn" onclick="loadCamera()">Load by key</button>
            <button class="btn" onclick="triggerCamera()">Trigger</button>
            <button class="btn btn-danger" onclick="deleteCamera()">Delete camera</button>
        </div>
    </div>

    <script>
        async function post(url, params) {{
            const response = await fetch(url, {{ method: 'POST', body: new URLSearchParams(params) }});
            const text = await response.text();
            return {{ ok: response.ok, status: response.status, text }};
        }}

        function markEventRead(eventKey) {{
            document.getElementById(eventKey).classList.remove('unread');
        }}

        async function deleteEvent(eventKey) {{
            const result = await post('/events/delete', {{ event: eventKey }});
            alert(result.text);
            if (result.ok) {{ location.reload(); }}
        }}

        async function saveCamera() {{
            const form = new FormData(document.getElementById('camera-form'));
            const result = await post('/camera/add', form);
            if (result.status === 400) {{
                document.getElementById('tips').textContent = result.text;
                return;
            }}
            alert(result.text);
        }}

        function cameraKey() {{
            return document.getElementById('cam_key').value || prompt('Camera key');
        }}

        async function triggerCamera() {{
            const key = cameraKey();
            if (!key) {{ return; }}
            const response = await fetch('/camera/trigger?' + new URLSearchParams({{ camera: key }}));
            alert(await response.text());
        }}

        async function deleteCamera() {{
            const key = cameraKey();
            if (!key || !confirm('Delete camera ' + key + '?')) {{ return; }}
            const result = await post('/camera/delete', {{ camera: key }});
            alert(result.text);
            if (result.ok) {{ document.getElementById('camera-form').reset(); document.getElementById('cam_key').value = ''; }}
        }}

        async function loadCamera() {{
            const key = cameraKey();
            if (!key) {{ return; }}
            const result = await post('/camera/edit', {{ camera: key, cmd: 'get' }});
            if (!result.ok) {{ alert(result.text); return; }}
            const cam = JSON.parse(result.text);
            for (const field of ['key', 'name', 'url', 'poll_max_fps', 'alert_max_fps', 'num_secs_after']) {{
                document.getElementById('cam_' + field).value = cam[field];
            }}
            document.getElementById('cam_enabled').value = cam.enabled ? '1' : '0';
        }}
    </script>
</body>
</html>
        "#,
        count = events.len(),
        empty = if events.is_empty() { "<p>No recorded events.</p>" } else { "" },
        rows = rows
    )
}

pub fn generate_player_html(snapshot: &PlayerSnapshot) -> String {
    format!(
        r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Event {event} - Camwatch Console</title>
    <link rel="stylesheet" href="/static/style.css">
</head>
<body>
    <div class="header"><h1>Event {event}</h1></div>
    <div class="container">
        <div class="panel player">
            <img id="imagePlayer" src="{frame}" alt="Event frame">
            <input type="range" id="sliderbar" min="1" max="{max}" step="1" value="{position}">
            <div id="playback_group">
                <button class="btn" onclick="transport('first')">⏮</button>
                <button class="btn" onclick="transport('prev')">⏪</button>
                <button class="btn" id="playback_stopstart" onclick="transport('toggle')">⏯</button>
                <button class="btn" onclick="transport('next')">⏩</button>
                <button class="btn" onclick="transport('last')">⏭</button>
            </div>
        </div>
        <button class="btn" onclick="goBack()">← Back</button>
        <button class="btn btn-danger" onclick="deleteEvent()">Delete event</button>
    </div>

    <script>
        const eventKey = '{event}';
        const slider = document.getElementById('sliderbar');
        const image = document.getElementById('imagePlayer');

        function render(snapshot) {{
            if (snapshot.frame && image.getAttribute('src') !== snapshot.frame) {{
                image.setAttribute('src', snapshot.frame);
            }}
            slider.value = snapshot.slider_position;
        }}

        async function refresh() {{
            const response = await fetch('/api/playback/' + eventKey);
            if (response.ok) {{ render(await response.json()); }}
        }}

        async function transport(action) {{
            await fetch('/api/playback/' + eventKey + '/transport/' + action, {{ method: 'POST' }});
            refresh();
        }}

        slider.addEventListener('input', async () => {{
            await fetch('/api/playback/' + eventKey + '/seek', {{
                method: 'POST',
                headers: {{ 'Content-Type': 'application/json' }},
                body: JSON.stringify({{ value: Number(slider.value) }})
            }});
            refresh();
        }});

        function goBack() {{
            history.go(-1);
        }}

        async function deleteEvent() {{
            await fetch('/api/playback/' + eventKey + '/transport/close', {{ method: 'POST' }});
            const response = await fetch('/events/delete', {{ method: 'POST', body: new URLSearchParams({{ event: eventKey }}) }});
            alert(await response.text());
            history.go(-1);
        }}

        // The session lives as long as this page does.
        window.addEventListener('pagehide', () => {{
            navigator.sendBeacon('/api/playback/' + eventKey + '/transport/close');
        }});
        window.addEventListener('pageshow', (e) => {{
            if (e.persisted) {{ location.reload(); }}
        }});

        setInterval(refresh, {poll_ms});
    </script>
</body>
</html>
        "#,
        event = snapshot.event,
        frame = snapshot.frame.as_deref().unwrap_or(""),
        max = snapshot.num_frames.max(1),
        position = snapshot.slider_position,
        poll_ms = 250
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_page_binds_slider_to_frame_count() {
        let html = generate_player_html(&PlayerSnapshot {
            event: "evt7".to_string(),
            frame: Some("/frames/evt7/0".to_string()),
            slider_position: 1,
            num_frames: 12,
            playing: true,
        });
        assert!(html.contains(r#"min="1" max="12""#));
        assert!(html.contains(r#"src="/frames/evt7/0""#));
        assert!(html.contains("/api/playback/' + eventKey + '/transport/"));
        assert!(html.contains("'pagehide'"));
        assert!(html.contains("navigator.sendBeacon('/api/playback/' + eventKey + '/transport/close')"));
    }

    #[test]
    fn test_index_lists_events() {
        let html = generate_index_html(&["evt1".to_string(), "evt2".to_string()]);
        assert!(html.contains("Recorded events (2)"));
        assert!(html.contains("/events/evt2/play"));
        assert!(!html.contains("No recorded events."));
    }

    #[test]
    fn test_index_has_camera_actions() {
        let html = generate_index_html(&[]);
        assert!(html.contains("No recorded events."));
        assert!(html.contains("post('/camera/delete', { camera: key })"));
        assert!(html.contains("fetch('/camera/trigger?'"));
    }
}
