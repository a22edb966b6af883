//! Integration examples and README, regenerated on every build so the pinned
//! SRI values always match what is in `dist/`.

use super::integrity::{hash, sri};
use super::{BuildError, read_source, write_output};
use crate::config::BuildConfig;
use serde_json::json;
use std::path::Path;
use tracing::info;

/// Where the published assets live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    pub cdn_base: String,
}

impl Site {
    pub fn from_config(config: &BuildConfig) -> Self {
        Self {
            cdn_base: config.cdn_base.clone(),
        }
    }

    fn script_url(&self) -> String {
        format!("{}/widget.min.js", self.cdn_base)
    }

    fn stylesheet_url(&self) -> String {
        format!("{}/widget.min.css", self.cdn_base)
    }
}

/// Markup a host page pastes in: mount point, pinned stylesheet and script.
pub fn integration_snippet(site: &Site, js_digest: &str, css_digest: &str) -> String {
    format!(
        r#"<!-- Mount point -->
<div id="civic-chat"
     data-api-url="/api/chat"
     data-consent-endpoint="/api/consent"
     data-title="Support Chat"
     data-welcome-message="Hello! How can we help you?"></div>

<!-- Styles -->
<link rel="stylesheet"
      href="{css_url}"
      integrity="{css_sri}"
      crossorigin="anonymous">

<!-- Script -->
<script src="{js_url}"
        integrity="{js_sri}"
        crossorigin="anonymous"
        async></script>

<!-- Initialization -->
<script>
    window.CivicChat && window.CivicChat.init();
</script>"#,
        css_url = site.stylesheet_url(),
        css_sri = sri(css_digest),
        js_url = site.script_url(),
        js_sri = sri(js_digest),
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn basic_example(site: &Site, js_digest: &str, css_digest: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Civic Chat Widget - Basic Example</title>
    <style>
        body {{ font-family: system-ui, sans-serif; max-width: 800px; margin: 0 auto; padding: 20px; line-height: 1.6; }}
        pre {{ background: #1e293b; color: #e2e8f0; padding: 16px; border-radius: 8px; overflow-x: auto; }}
    </style>
</head>
<body>
    <h1>Civic Chat Widget - Basic Example</h1>

    <h2>Integration code</h2>
    <pre><code>{snippet}</code></pre>

    <h2>How it works</h2>
    <ul>
        <li>The script loads asynchronously and never blocks rendering.</li>
        <li>Configuration comes from <code>data-*</code> attributes on the mount point.</li>
        <li>SRI hashes pin the exact bytes of both files.</li>
        <li>Versioned files are safe to cache for a year.</li>
    </ul>

    <div id="civic-chat"
         data-api-url="/api/chat"
         data-consent-endpoint="/api/consent"
         data-title="Support Chat"
         data-welcome-message="Hello! How can we help you today?"></div>

    <link rel="stylesheet"
          href="../dist/widget.min.css"
          integrity="{css_sri}"
          crossorigin="anonymous">
    <script src="../dist/widget.min.js"
            integrity="{js_sri}"
            crossorigin="anonymous"
            async></script>
    <script>
        window.CivicChat && window.CivicChat.init();
    </script>
</body>
</html>
"#,
        snippet = escape_html(&integration_snippet(site, js_digest, css_digest)),
        css_sri = sri(css_digest),
        js_sri = sri(js_digest),
    )
}

pub fn csp_strict_example(site: &Site, js_digest: &str, css_digest: &str) -> String {
    let cdn_origin = url::Url::parse(&site.cdn_base)
        .ok()
        .map(|u| u.origin().ascii_serialization())
        .filter(|origin| origin != "null")
        .unwrap_or_else(|| "'self'".to_string());
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <meta http-equiv="Content-Security-Policy" content="
        default-src 'self';
        script-src 'self' {cdn_origin} '{js_sri}';
        style-src 'self' {cdn_origin} '{css_sri}';
        connect-src 'self';
        object-src 'none';
        base-uri 'self';
        form-action 'self';
        frame-ancestors 'none';
    ">
    <title>Civic Chat Widget - CSP Strict Example</title>
    <link rel="stylesheet"
          href="../dist/widget.min.css"
          integrity="{css_sri}"
          crossorigin="anonymous">
</head>
<body>
    <h1>Civic Chat Widget - CSP Strict Example</h1>
    <p>Both files are loaded from their own URLs and pinned with SRI, so the
       policy needs no <code>'unsafe-inline'</code>.</p>
    <p><strong>style-src:</strong> <code>'self' {cdn_origin} '{css_sri}'</code></p>

    <div id="civic-chat"
         data-api-url="/api/chat"
         data-config-url="/api/config.json"></div>

    <script src="../dist/widget.min.js"
            integrity="{js_sri}"
            crossorigin="anonymous"
            async></script>
    <script>
        window.CivicChat && window.CivicChat.init({{ useExternalCSS: true }});
    </script>
</body>
</html>
"#,
        css_sri = sri(css_digest),
        js_sri = sri(js_digest),
    )
}

/// Sample remote configuration served from `data-config-url`.
pub fn config_example() -> serde_json::Value {
    json!({
        "apiUrl": "/api/chat",
        "consentEndpoint": "/api/consent",
        "title": "Support Chat",
        "welcomeMessage": "Hello! How can I help you today?",
        "lang": "en",
        "features": {
            "typingIndicator": true,
            "autoFocus": true,
            "escapeToClose": true
        }
    })
}

pub fn readme(site: &Site, js_digest: &str, css_digest: &str) -> String {
    format!(
        r#"# Civic Chat Widget

A standalone, CDN-ready chat widget with no runtime dependencies.

## Quick start

```html
{snippet}
```

## CDN URLs

- Script: `{js_url}`
- Stylesheet: `{css_url}`
- Content-addressed copies (`widget.<hash>.min.*`) are published next to them
  and never change.

## Configuration

### Data attributes

- `data-api-url` - chat message endpoint
- `data-consent-endpoint` - consent endpoint; omit it to skip the consent step
- `data-config-url` - JSON configuration merged over the attributes
- `data-title` - widget title
- `data-welcome-message` - first bot message
- `data-lang` - UI language

### JavaScript API

```javascript
const chat = await window.CivicChat.init({{
    el: document.getElementById('civic-chat'),
    apiUrl: '/api/chat',
    consentEndpoint: '/api/consent',
    configUrl: '/api/config.json',
    title: 'Support Chat',
    welcomeMessage: 'Hello! How can I help you?',
    useExternalCSS: true,
    autoShow: false
}});
chat.show();
```

Explicit options win over the remote configuration, which wins over
`data-*` attributes.

### Styles

The widget does not bundle its stylesheet. Load the pinned `widget.min.css`
with the `<link>` from the quick start, or pass the stylesheet text as the
`css` option to have it injected (tagged with the page nonce):

```javascript
await window.CivicChat.init({{ css: myWidgetCss, nonce: 'r4nd0m' }});
```

`useExternalCSS: true` skips injection even when `css` is given.

## Security

- SRI: `{js_sri}` (script), `{css_sri}` (stylesheet)
- CSP friendly: no inline styles required, nonce supported
- Immutable caching for versioned files

## Development

```bash
cargo run --release            # build dist/, demos/ and this README
cargo run --release -- sri     # print SRI values for the current dist/
cargo run --release -- serve   # preview on http://127.0.0.1:8080
```

## License

MIT
"#,
        snippet = integration_snippet(site, js_digest, css_digest),
        js_url = site.script_url(),
        css_url = site.stylesheet_url(),
        js_sri = sri(js_digest),
        css_sri = sri(css_digest),
    )
}

/// Write `basic.html`, `csp-strict.html` and `config.json` into `dir`.
pub async fn generate_examples(
    site: &Site,
    js_digest: &str,
    css_digest: &str,
    dir: &Path,
) -> Result<(), BuildError> {
    write_output(
        &dir.join("basic.html"),
        basic_example(site, js_digest, css_digest).as_bytes(),
    )
    .await?;
    write_output(
        &dir.join("csp-strict.html"),
        csp_strict_example(site, js_digest, css_digest).as_bytes(),
    )
    .await?;
    let config = serde_json::to_string_pretty(&config_example()).unwrap_or_default();
    write_output(&dir.join("config.json"), config.as_bytes()).await?;
    info!(dir = %dir.display(), "example files generated");
    Ok(())
}

pub async fn generate_readme(
    site: &Site,
    js_digest: &str,
    css_digest: &str,
    path: &Path,
) -> Result<(), BuildError> {
    write_output(path, readme(site, js_digest, css_digest).as_bytes()).await?;
    info!(path = %path.display(), "readme generated");
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SriReport {
    pub js_digest: String,
    pub css_digest: String,
    pub snippet: String,
}

/// Recompute SRI values for an existing `dist/` and write `snippet_path`.
pub async fn sri_report(
    site: &Site,
    dist_dir: &Path,
    snippet_path: &Path,
) -> Result<SriReport, BuildError> {
    let js = read_source(&dist_dir.join("widget.min.js")).await?;
    let css = read_source(&dist_dir.join("widget.min.css")).await?;
    let js_digest = hash(js.as_bytes());
    let css_digest = hash(css.as_bytes());
    let snippet = integration_snippet(site, &js_digest, &css_digest);
    write_output(snippet_path, snippet.as_bytes()).await?;
    info!(path = %snippet_path.display(), "sri snippet written");
    Ok(SriReport {
        js_digest,
        css_digest,
        snippet,
    })
}
