//! The chat page.
//!
//! One server-rendered HTML page with an inline script: hydrate the message
//! list from `/api/chat/state`, submit through `/api/chat`, stream deltas
//! with `EventSource`, and toggle the send/stop affordances off the session
//! status. No external assets, so the binary is self-contained.

use crate::config::BrandingConfig;

/// Stylesheet for the chat page.
const STYLE: &str = r"
:root { color-scheme: dark; }
* { box-sizing: border-box; }
body {
    margin: 0; min-height: 100vh;
    background: #0f1117; color: #e6e8ee;
    font-family: system-ui, -apple-system, 'Segoe UI', sans-serif;
    display: flex; flex-direction: column;
}
.app-header {
    display: flex; align-items: center; justify-content: space-between;
    padding: 0.75rem 1.25rem; background: #161a23;
    box-shadow: 0 1px 3px rgb(0 0 0 / 0.4);
}
.app-title { font-weight: 600; font-size: 1.05rem; }
.ghost-btn {
    background: none; border: 1px solid #2b3040; color: #9aa1b2;
    border-radius: 0.75rem; padding: 0.4rem 0.8rem; font-size: 0.8rem;
    cursor: pointer; transition: color 0.15s, border-color 0.15s;
}
.ghost-btn:hover { color: #e6e8ee; border-color: #4b5268; }
.chat-shell {
    flex: 1; display: flex; flex-direction: column;
    width: 100%; max-width: 46rem; margin: 0 auto; padding: 1rem;
    min-height: 0;
}
.message-list { flex: 1; overflow-y: auto; padding: 0.5rem 0; }
.chat-row { display: flex; margin: 0.4rem 0; }
.chat-row.user { justify-content: flex-end; }
.chat-row.assistant { justify-content: flex-start; }
.chat-bubble {
    max-width: 80%; padding: 0.6rem 0.9rem; border-radius: 1rem;
    white-space: pre-wrap; word-break: break-word; line-height: 1.45;
    font-size: 0.95rem;
}
.chat-bubble-user { background: #3b5bdb; color: #fff; border-bottom-right-radius: 0.25rem; }
.chat-bubble-assistant { background: #1d222e; border-bottom-left-radius: 0.25rem; }
.duration {
    display: block; margin-top: 0.35rem; font-size: 0.7rem; color: #8b93a7;
}
.empty-state { text-align: center; color: #9aa1b2; margin: 3rem 0; }
.empty-state .empty-owner { font-size: 0.8rem; color: #6b7280; }
.composer { display: flex; gap: 0.5rem; padding-top: 0.75rem; }
.composer input {
    flex: 1; background: #1d222e; border: 1px solid #2b3040; color: #e6e8ee;
    border-radius: 1rem; padding: 0.7rem 1rem; font-size: 0.95rem; outline: none;
}
.composer input:focus { border-color: #3b5bdb; }
.composer button {
    border: none; border-radius: 1rem; padding: 0 1.2rem; font-size: 0.9rem;
    cursor: pointer; transition: opacity 0.15s;
}
.composer button:disabled { opacity: 0.4; cursor: not-allowed; }
#send-btn { background: #3b5bdb; color: #fff; }
#stop-btn { background: #b23b3b; color: #fff; }
.status-note { min-height: 1.1rem; font-size: 0.75rem; color: #8b93a7; padding: 0.25rem 0.25rem 0; }
.status-note.error { color: #e36b6b; }
";

/// Page script: state hydration, submit/stop toggling, SSE consumption.
const PAGE_SCRIPT: &str = r#"
(function () {
    const form = document.getElementById('composer');
    const input = document.getElementById('composer-input');
    const sendBtn = document.getElementById('send-btn');
    const stopBtn = document.getElementById('stop-btn');
    const clearBtn = document.getElementById('clear-btn');
    const list = document.getElementById('message-list');
    const emptyState = document.getElementById('empty-state');
    const statusNote = document.getElementById('status-note');

    let status = 'idle';
    let source = null;

    function busy() { return status === 'submitted' || status === 'streaming'; }

    function escapeHtml(s) {
        return s.replace(/[&<>"']/g, function (c) {
            return { '&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;', "'": '&#39;' }[c];
        });
    }

    function bubble(role, text, durationMs) {
        const side = role === 'user' ? 'chat-bubble-user' : 'chat-bubble-assistant';
        const badge = durationMs != null
            ? '<span class="duration">' + (durationMs / 1000).toFixed(1) + 's</span>'
            : '';
        return '<div class="chat-row ' + role + '"><div class="chat-bubble ' + side + '">'
            + escapeHtml(text) + badge + '</div></div>';
    }

    function setStatus(next) {
        status = next;
        sendBtn.hidden = busy();
        stopBtn.hidden = !busy();
        sendBtn.disabled = input.value.trim() === '';
        statusNote.textContent = status === 'error' ? 'The last response failed.' : '';
        statusNote.className = status === 'error' ? 'status-note error' : 'status-note';
    }

    function render(state) {
        list.innerHTML = state.messages.map(function (m) {
            return bubble(m.role, m.text, m.duration_ms);
        }).join('');
        emptyState.hidden = state.messages.length > 0;
        setStatus(state.status);
        list.scrollTop = list.scrollHeight;
    }

    async function refresh() {
        try {
            const res = await fetch('/api/chat/state');
            if (res.ok) { render(await res.json()); }
        } catch (_) { /* keep whatever is on screen */ }
    }

    function appendLive() {
        const row = document.createElement('div');
        row.className = 'chat-row assistant';
        row.innerHTML = '<div class="chat-bubble chat-bubble-assistant"></div>';
        list.appendChild(row);
        return row.firstChild;
    }

    function openStream(url) {
        source = new EventSource(url);
        let live = null;

        function finishStream() {
            if (source) { source.close(); source = null; }
            refresh();
        }

        source.addEventListener('message.delta', function (e) {
            const delta = JSON.parse(e.data).data.text;
            if (!live) { live = appendLive(); setStatus('streaming'); }
            live.textContent += delta;
            list.scrollTop = list.scrollHeight;
        });
        source.addEventListener('done', finishStream);
        source.addEventListener('error', function (e) {
            // EventSource network events also fire as 'error' but carry no data
            if (e.data) { finishStream(); }
        });
        source.onerror = finishStream;
    }

    form.addEventListener('submit', async function (e) {
        e.preventDefault();
        const text = input.value.trim();
        if (!text || busy()) { return; }

        const res = await fetch('/api/chat', {
            method: 'POST',
            headers: { 'Content-Type': 'application/json' },
            body: JSON.stringify({ message: text })
        });
        if (!res.ok) { refresh(); return; }
        const body = await res.json();

        input.value = '';
        list.insertAdjacentHTML('beforeend', bubble('user', text, null));
        emptyState.hidden = true;
        setStatus('submitted');
        openStream(body.stream_url);
    });

    stopBtn.addEventListener('click', function () {
        fetch('/api/chat/stop', { method: 'POST' });
    });

    clearBtn.addEventListener('click', async function () {
        if (busy()) { return; }
        await fetch('/api/chat', { method: 'DELETE' });
        refresh();
    });

    input.addEventListener('input', function () {
        sendBtn.disabled = input.value.trim() === '';
    });

    refresh();
})();
"#;

/// Render the chat page with the configured branding.
#[must_use]
pub fn render_chat_page(branding: &BrandingConfig) -> String {
    let app_name = escape_html(&branding.app_name);
    let owner = escape_html(&branding.owner_name);
    let welcome = escape_html(&branding.welcome_text);

    let owner_line = if owner.is_empty() {
        String::new()
    } else {
        format!(r#"<p class="empty-owner">{owner}</p>"#)
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{app_name}</title>
    <style>{style}</style>
</head>
<body>
    <header class="app-header">
        <span class="app-title">{app_name}</span>
        <button id="clear-btn" class="ghost-btn" type="button">New chat</button>
    </header>
    <main class="chat-shell">
        <div id="message-list" class="message-list"></div>
        <div id="empty-state" class="empty-state">
            <p>{welcome}</p>
            {owner_line}
        </div>
        <div id="status-note" class="status-note"></div>
        <form id="composer" class="composer" autocomplete="off">
            <input id="composer-input" name="message" placeholder="Type your message..." required>
            <button id="send-btn" type="submit" disabled>Send</button>
            <button id="stop-btn" type="button" hidden>Stop</button>
        </form>
    </main>
    <script>{script}</script>
</body>
</html>"#,
        style = STYLE,
        script = PAGE_SCRIPT,
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
