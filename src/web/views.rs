use std::collections::BTreeSet;

use v_htmlescape::escape;

use crate::form::MAX_IMAGE_BYTES;
use crate::plan::{FormField, Plan};
use crate::site::{DEFAULT_BRAND_COLOR, DEFAULT_CTA_TEXT};

const PAGE_STYLE: &str = r#"
        :root { color-scheme: light; }
        body {
            margin: 0;
            font-family: 'Inter', system-ui, -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif;
            background: #f1f5f9;
            color: #0f172a;
        }
        main {
            width: min(1200px, 96vw);
            margin: 2rem auto;
        }
        header h1 { margin: 0; font-size: clamp(1.6rem, 3vw, 2.2rem); }
        header p { margin: 0.35rem 0 0; color: #475569; }
        .layout {
            display: grid;
            grid-template-columns: minmax(320px, 440px) 1fr;
            gap: 1.5rem;
            margin-top: 1.5rem;
        }
        .panel {
            background: #fff;
            border: 1px solid #e2e8f0;
            border-radius: 16px;
            padding: 1.5rem;
        }
        form { display: grid; gap: 1rem; }
        fieldset { border: 1px solid #e2e8f0; border-radius: 12px; padding: 1rem; display: grid; gap: 0.75rem; }
        legend { font-weight: 600; padding: 0 0.35rem; }
        label { display: flex; flex-direction: column; gap: 0.35rem; font-size: 0.92rem; }
        label.inline { flex-direction: row; align-items: center; }
        input, select, textarea {
            border-radius: 10px;
            border: 1px solid #cbd5e1;
            padding: 0.6rem 0.75rem;
            font: inherit;
        }
        textarea { min-height: 4.5rem; resize: vertical; }
        [disabled] { opacity: 0.5; cursor: not-allowed; }
        .hint { color: #64748b; font-size: 0.82rem; }
        .actions { display: flex; gap: 0.75rem; flex-wrap: wrap; }
        button {
            border-radius: 10px;
            border: none;
            padding: 0.75rem 1.25rem;
            font-weight: 600;
            cursor: pointer;
            background: #0ea5e9;
            color: #fff;
        }
        button.secondary { background: #e2e8f0; color: #0f172a; }
        iframe { width: 100%; min-height: 80vh; border: 0; border-radius: 12px; background: #fff; }
        .logos { display: grid; grid-template-columns: repeat(auto-fill, minmax(96px, 1fr)); gap: 0.5rem; }
        .logos img { width: 100%; border: 2px solid transparent; border-radius: 8px; cursor: pointer; background: #fff; }
        .logos img.selected { border-color: #0ea5e9; }
        .notice { padding: 2.5rem; text-align: center; }
        .notice a { color: #0284c7; font-weight: 600; }
"#;

const BUILDER_SCRIPT: &str = r#"
(function () {
    const form = document.getElementById('builder');
    const frame = document.getElementById('preview');
    const planSelect = form.elements['plan'];
    const galleryHint = document.getElementById('gallery-limit');
    const checkoutButton = document.getElementById('checkout');

    async function applyPlan(plan) {
        const response = await fetch('/plans/' + encodeURIComponent(plan) + '/locked');
        if (!response.ok) return;
        const gate = await response.json();
        document.querySelectorAll('[data-field]').forEach(function (control) {
            control.disabled = gate.locked.includes(control.dataset.field);
        });
        galleryHint.textContent = 'Up to ' + gate.galleryLimit + ' images';
    }

    async function renderPreview() {
        const response = await fetch('/preview', { method: 'POST', body: new FormData(form) });
        if (!response.ok) {
            const body = await response.json().catch(function () { return {}; });
            throw new Error(body.error || 'Preview failed');
        }
        const html = await response.text();
        frame.srcdoc = html;
        return html;
    }

    function toBase64(text) {
        const bytes = new TextEncoder().encode(text);
        let binary = '';
        bytes.forEach(function (byte) { binary += String.fromCharCode(byte); });
        return btoa(binary);
    }

    planSelect.addEventListener('change', function () { applyPlan(planSelect.value); });

    form.addEventListener('submit', function (event) {
        event.preventDefault();
        renderPreview().catch(function (err) { alert(err.message); });
    });

    checkoutButton.addEventListener('click', async function () {
        checkoutButton.disabled = true;
        try {
            const html = await renderPreview();
            const response = await fetch('/checkout', {
                method: 'POST',
                headers: { 'Content-Type': 'application/json' },
                body: JSON.stringify({
                    plan: planSelect.value,
                    sitePayload: {
                        businessName: form.elements['businessName'].value,
                        description: form.elements['description'].value,
                        htmlBase64: toBase64(html)
                    }
                })
            });
            const body = await response.json().catch(function () { return {}; });
            if (!response.ok || !body.url) {
                throw new Error(body.error || 'Checkout failed');
            }
            window.location.href = body.url;
        } catch (err) {
            alert(err.message);
            checkoutButton.disabled = false;
        }
    });

    document.getElementById('generate-logos').addEventListener('click', async function (event) {
        const button = event.currentTarget;
        const list = document.getElementById('logo-options');
        button.disabled = true;
        try {
            const response = await fetch('/ai-logo', {
                method: 'POST',
                headers: { 'Content-Type': 'application/json' },
                body: JSON.stringify({
                    brand: form.elements['businessName'].value,
                    slogan: form.elements['logoSlogan'].value,
                    industry: form.elements['logoIndustry'].value,
                    style: form.elements['logoStyle'].value,
                    colors: form.elements['logoColors'].value
                })
            });
            const body = await response.json();
            list.replaceChildren();
            (body.images || []).forEach(function (src) {
                const img = document.createElement('img');
                img.src = src;
                img.alt = 'Logo option';
                img.addEventListener('click', function () {
                    list.querySelectorAll('img').forEach(function (other) { other.classList.remove('selected'); });
                    img.classList.add('selected');
                    form.elements['logoDataUrl'].value = src;
                });
                list.appendChild(img);
            });
        } finally {
            button.disabled = false;
        }
    });
})();
"#;

const SUCCESS_SCRIPT: &str = r#"
(function () {
    const status = document.getElementById('status');
    const sessionId = new URLSearchParams(window.location.search).get('session_id') || '';
    fetch('/verify-session?session_id=' + encodeURIComponent(sessionId))
        .then(function (response) { return response.json(); })
        .then(function (body) {
            if (body.paid) {
                const link = document.createElement('a');
                link.href = '/download?session_id=' + encodeURIComponent(sessionId);
                link.textContent = 'Download your site';
                status.replaceChildren('Payment confirmed. A copy is on its way to your inbox. ', link);
            } else {
                status.textContent = 'We could not confirm this payment yet. Refresh in a moment or contact support.';
            }
        })
        .catch(function () {
            status.textContent = 'We could not confirm this payment yet. Refresh in a moment or contact support.';
        });
})();
"#;

fn gate(locked: &BTreeSet<FormField>, field: FormField) -> String {
    let disabled = if locked.contains(&field) { " disabled" } else { "" };
    format!(r#"data-field="{}"{}"#, field.id(), disabled)
}

fn page(title: &str, body: &str, script: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <style>{style}</style>
</head>
<body>
<main>
{body}
</main>
<script>{script}</script>
</body>
</html>"#,
        title = escape(title),
        style = PAGE_STYLE,
    )
}

/// Builder form with the controls `locked` names rendered disabled.
pub fn render_builder_page(plan: Plan, locked: &BTreeSet<FormField>, checkout_ready: bool) -> String {
    let plan_options: String = Plan::ALL
        .iter()
        .map(|option| {
            format!(
                r#"<option value="{value}"{selected}>{label}</option>"#,
                value = option.as_str(),
                selected = if *option == plan { " selected" } else { "" },
                label = option.label(),
            )
        })
        .collect();
    let checkout_note = if checkout_ready {
        ""
    } else {
        r#"<p class="hint">Checkout is not configured on this server.</p>"#
    };

    let body = format!(
        r##"    <header>
        <h1>Website Builder</h1>
        <p>Fill in your details, preview the result, then export your site.</p>
    </header>
    <div class="layout">
        <section class="panel">
            <form id="builder" enctype="multipart/form-data">
                <label>Plan
                    <select name="plan">{plan_options}</select>
                </label>
                <fieldset>
                    <legend>Business</legend>
                    <label>Business name
                        <input type="text" name="businessName" required>
                    </label>
                    <label>Description
                        <textarea name="description"></textarea>
                    </label>
                    <label>Call to action
                        <input type="text" name="ctaText" placeholder="{cta}">
                    </label>
                    <label>Services <span class="hint">One per line</span>
                        <textarea name="services" {services}></textarea>
                    </label>
                    <label>Testimonials <span class="hint">Name | Quote, one per line</span>
                        <textarea name="testimonials" {testimonials}></textarea>
                    </label>
                    <label>Gallery <span class="hint" id="gallery-limit">Up to {gallery_limit} images</span>
                        <input type="file" name="gallery" accept="image/*" multiple>
                    </label>
                    <span class="hint">Images larger than {max_kib} KiB are skipped.</span>
                </fieldset>
                <fieldset>
                    <legend>Branding</legend>
                    <label>Logo
                        <input type="file" name="logo" accept="image/*" {logo}>
                    </label>
                    <input type="hidden" name="logoDataUrl" {logo}>
                    <label>Brand color
                        <input type="color" name="brandColor" value="{brand_color}" {brand_color_gate}>
                    </label>
                    <label>Theme
                        <select name="theme" {theme}>
                            <option value="light">Light</option>
                            <option value="dark">Dark</option>
                        </select>
                    </label>
                    <label>Font
                        <select name="font" {font}>
                            <option value="system-ui">System</option>
                            <option value="Inter">Inter</option>
                            <option value="Poppins">Poppins</option>
                            <option value="Playfair Display">Playfair Display</option>
                        </select>
                    </label>
                </fieldset>
                <fieldset>
                    <legend>Logo ideas</legend>
                    <label>Slogan <input type="text" name="logoSlogan"></label>
                    <label>Industry <input type="text" name="logoIndustry" placeholder="bakery, fitness, legal"></label>
                    <label>Style
                        <select name="logoStyle">
                            <option value="minimal">Minimal</option>
                            <option value="bold">Bold</option>
                            <option value="playful">Playful</option>
                            <option value="elegant">Elegant</option>
                            <option value="modern">Modern</option>
                        </select>
                    </label>
                    <label>Colors <input type="text" name="logoColors" placeholder="#0ea5e9, #f59e0b"></label>
                    <button type="button" class="secondary" id="generate-logos">Generate logos</button>
                    <div class="logos" id="logo-options"></div>
                </fieldset>
                <fieldset>
                    <legend>Hours &amp; contact</legend>
                    <label>Hours <span class="hint">One per line</span>
                        <textarea name="hours"></textarea>
                    </label>
                    <label>Address <input type="text" name="address"></label>
                    <label>Email <input type="email" name="email"></label>
                    <label>Phone <input type="tel" name="phone"></label>
                    <label>Instagram <input type="text" name="instagram" placeholder="@handle or URL"></label>
                </fieldset>
                <fieldset>
                    <legend>SEO</legend>
                    <label>Title <input type="text" name="seoTitle" {seo_title}></label>
                    <label>Description <textarea name="seoDescription" {seo_description}></textarea></label>
                    <label>Canonical URL <input type="url" name="canonicalUrl" {canonical_url}></label>
                    <label>Analytics ID <input type="text" name="analyticsId" placeholder="G-XXXXXXX" {analytics_id}></label>
                    <label>Search Console token <input type="text" name="searchConsoleToken" {search_console}></label>
                    <label class="inline"><input type="checkbox" name="allowIndexing" checked {allow_indexing}> Allow search engines to index</label>
                </fieldset>
                <div class="actions">
                    <button type="submit" class="secondary">Preview</button>
                    <button type="button" id="checkout"{checkout_disabled}>Export site</button>
                </div>
                {checkout_note}
            </form>
        </section>
        <section class="panel">
            <iframe id="preview" title="Site preview" sandbox="allow-same-origin"></iframe>
        </section>
    </div>"##,
        cta = escape(DEFAULT_CTA_TEXT),
        gallery_limit = plan.features().gallery_limit,
        max_kib = MAX_IMAGE_BYTES / 1024,
        brand_color = DEFAULT_BRAND_COLOR,
        services = gate(locked, FormField::Services),
        testimonials = gate(locked, FormField::Testimonials),
        logo = gate(locked, FormField::Logo),
        brand_color_gate = gate(locked, FormField::BrandColor),
        theme = gate(locked, FormField::Theme),
        font = gate(locked, FormField::Font),
        seo_title = gate(locked, FormField::SeoTitle),
        seo_description = gate(locked, FormField::SeoDescription),
        canonical_url = gate(locked, FormField::CanonicalUrl),
        analytics_id = gate(locked, FormField::AnalyticsId),
        search_console = gate(locked, FormField::SearchConsoleToken),
        allow_indexing = gate(locked, FormField::AllowIndexing),
        checkout_disabled = if checkout_ready { "" } else { " disabled" },
    );

    page("Website Builder", &body, BUILDER_SCRIPT)
}

pub fn render_success_page() -> String {
    let body = r#"    <section class="panel notice">
        <h1>Thank you!</h1>
        <p id="status">Confirming your payment&hellip;</p>
        <p><a href="/">Back to the builder</a></p>
    </section>"#;
    page("Payment received", body, SUCCESS_SCRIPT)
}

pub fn render_cancel_page() -> String {
    let body = r#"    <section class="panel notice">
        <h1>Checkout cancelled</h1>
        <p>No payment was taken. Your work is still in the builder.</p>
        <p><a href="/">Return to the builder</a></p>
    </section>"#;
    page("Checkout cancelled", body, "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::locked_fields;

    #[test]
    fn basic_plan_renders_gated_controls_disabled() {
        let html = render_builder_page(Plan::Basic, &locked_fields(Plan::Basic), true);
        assert!(html.contains(r#"name="services" data-field="services" disabled"#));
        assert!(html.contains(r#"name="seoTitle" data-field="seoTitle" disabled"#));
        assert!(html.contains(r#"<option value="basic" selected>"#));
        assert!(html.contains(r#"id="checkout">"#));
    }

    #[test]
    fn business_plan_unlocks_everything() {
        let html = render_builder_page(Plan::Business, &locked_fields(Plan::Business), true);
        assert!(!html.contains("\" disabled"));
        assert!(html.contains("Up to 12 images"));
    }

    #[test]
    fn checkout_button_disabled_without_payments() {
        let html = render_builder_page(Plan::Pro, &locked_fields(Plan::Pro), false);
        assert!(html.contains(r#"id="checkout" disabled>"#));
        assert!(html.contains("Checkout is not configured"));
    }

    #[test]
    fn success_page_verifies_on_the_server() {
        let html = render_success_page();
        assert!(html.contains("/verify-session?session_id="));
        assert!(!html.contains("localStorage"));
        assert!(!html.contains("document.cookie"));
    }
}
