use chrono::{Datelike, Utc};
use v_htmlescape::escape;

use crate::site::{normalize_brand_color, Font, SiteData, Theme, DEFAULT_BRAND_COLOR};

const FALLBACK_CONTACT_EMAIL: &str = "hello@example.com";

/// Renders the complete standalone HTML document for `site`.
///
/// Output depends only on the arguments. Fields the site's plan does not unlock are ignored
/// here, so their values survive a later upgrade.
pub fn assemble(site: &SiteData, year: i32) -> String {
    let features = site.plan.features();
    let name = escape(&site.business_name).to_string();

    let (brand_color, theme, font, logo) = if features.branding {
        (
            normalize_brand_color(&site.brand_color),
            site.theme,
            site.font,
            site.logo.as_deref(),
        )
    } else {
        (
            DEFAULT_BRAND_COLOR.to_string(),
            Theme::Light,
            Font::SystemUi,
            None,
        )
    };

    let font_link = font
        .stylesheet_href()
        .map(|href| format!(r#"<link href="{}" rel="stylesheet">"#, escape(href)))
        .unwrap_or_default();
    let head_meta = if features.seo {
        render_seo_head(site)
    } else {
        String::new()
    };
    let title = match (&site.seo.title, features.seo) {
        (Some(title), true) => escape(title).to_string(),
        _ => name.clone(),
    };
    let (background, ink, card, muted) = match theme {
        Theme::Light => ("#f1f5f9", "#0f172a", "#ffffff", "#475569"),
        Theme::Dark => ("#020617", "#e2e8f0", "#1e293b", "#94a3b8"),
    };

    let logo_html = logo
        .map(|src| format!(r#"<img class="logo" src="{}" alt="Logo">"#, escape(src)))
        .unwrap_or_default();

    let services_html = if features.services {
        render_list_section("Services", &site.services)
    } else {
        String::new()
    };
    let testimonials_html = if features.testimonials {
        render_testimonials(site)
    } else {
        String::new()
    };

    let cta_email = site.email.as_deref().unwrap_or(FALLBACK_CONTACT_EMAIL);

    format!(
        r##"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8"/>
<meta name="viewport" content="width=device-width,initial-scale=1"/>
<title>{title}</title>
{head_meta}{font_link}
<style>
  :root{{
    --brand:{brand_color};
    --bg:{background};
    --ink:{ink};
    --card:{card};
    --muted:{muted};
  }}
  *{{ box-sizing:border-box }}
  body{{ margin:0; background:var(--bg); color:var(--ink); font-family:{font_stack}; line-height:1.5; }}
  header.bar{{ padding:22px 16px; display:flex; align-items:center; gap:12px; max-width:1000px; margin:0 auto; }}
  header .logo{{ height:44px; width:auto; border-radius:8px; background:#fff; padding:4px; }}
  header h1{{ margin:0; font-size:28px; }}
  main{{ max-width:1000px; margin:0 auto 40px; padding:0 16px; }}
  .card{{ background:var(--card); border-radius:14px; box-shadow:0 10px 30px rgba(15,23,42,.12); padding:22px; margin-bottom:22px; }}
  h2{{ margin:0 0 10px; }}
  .cta{{ display:inline-block; margin-top:12px; background:var(--brand); color:#fff; text-decoration:none; padding:10px 16px; border-radius:10px; }}
  .grid{{ display:grid; grid-template-columns:repeat(auto-fill,minmax(180px,1fr)); gap:12px; }}
  .thumb{{ margin:0; border-radius:12px; overflow:hidden; }}
  .thumb img{{ width:100%; height:160px; object-fit:cover; display:block; }}
  .list{{ padding-left:18px; }}
  .testis{{ display:grid; gap:12px; }}
  blockquote{{ margin:0; padding:14px; border-left:4px solid var(--brand); border-radius:10px; }}
  blockquote footer{{ font-size:14px; color:var(--muted); }}
  .contact{{ display:inline-block; margin-right:12px; color:var(--brand); text-decoration:none; }}
  footer.site{{ text-align:center; color:var(--muted); padding:24px 12px; }}
</style>
</head>
<body>
  <header class="bar">
    {logo_html}
    <h1>{name}</h1>
  </header>
  <main>
    <section class="card hero">
      <h2>About Us</h2>
      <p>{description}</p>
      <a class="cta" href="mailto:{cta_email}">{cta_text}</a>
    </section>
{services_html}{testimonials_html}{gallery_html}{hours_html}{contact_html}  </main>
  <footer class="site">&copy; {year} {name}. All rights reserved.</footer>
</body>
</html>
"##,
        title = title,
        head_meta = head_meta,
        font_link = font_link,
        brand_color = brand_color,
        background = background,
        ink = ink,
        card = card,
        muted = muted,
        font_stack = font.stack(),
        logo_html = logo_html,
        name = name,
        description = escape(&site.description),
        cta_email = escape(cta_email),
        cta_text = escape(&site.cta_text),
        services_html = services_html,
        testimonials_html = testimonials_html,
        gallery_html = render_gallery(&site.gallery),
        hours_html = render_hours(site),
        contact_html = render_contact(site),
        year = year,
    )
}

/// `assemble` stamped with the current UTC year.
pub fn assemble_now(site: &SiteData) -> String {
    assemble(site, Utc::now().year())
}

fn render_seo_head(site: &SiteData) -> String {
    let seo = &site.seo;
    let mut tags = Vec::new();

    if let Some(description) = &seo.description {
        tags.push(format!(
            r#"<meta name="description" content="{}"/>"#,
            escape(description)
        ));
    }
    let robots = if seo.allow_indexing {
        "index,follow"
    } else {
        "noindex,nofollow"
    };
    tags.push(format!(r#"<meta name="robots" content="{robots}"/>"#));
    if let Some(url) = seo.canonical_url.as_deref().filter(|url| is_http_url(url)) {
        tags.push(format!(r#"<link rel="canonical" href="{}"/>"#, escape(url)));
    }
    if let Some(token) = &seo.search_console_token {
        tags.push(format!(
            r#"<meta name="google-site-verification" content="{}"/>"#,
            escape(token)
        ));
    }
    if let Some(id) = seo.analytics_id.as_deref().filter(|id| is_analytics_id(id)) {
        tags.push(format!(
            r#"<script async src="https://www.googletagmanager.com/gtag/js?id={id}"></script>
<script>window.dataLayer=window.dataLayer||[];function gtag(){{dataLayer.push(arguments);}}gtag('js',new Date());gtag('config','{id}');</script>"#
        ));
    }

    let mut out = tags.join("\n");
    out.push('\n');
    out
}

fn render_list_section(heading: &str, items: &[String]) -> String {
    if items.is_empty() {
        return String::new();
    }
    let items: String = items
        .iter()
        .map(|item| format!("<li>{}</li>", escape(item)))
        .collect();
    format!(
        "    <section class=\"card\">\n      <h2>{heading}</h2>\n      <ul class=\"list\">{items}</ul>\n    </section>\n"
    )
}

fn render_testimonials(site: &SiteData) -> String {
    if site.testimonials.is_empty() {
        return String::new();
    }
    let quotes: String = site
        .testimonials
        .iter()
        .map(|t| {
            format!(
                "<blockquote><p>&ldquo;{}&rdquo;</p><footer>&mdash; {}</footer></blockquote>",
                escape(&t.quote),
                escape(&t.name)
            )
        })
        .collect();
    format!(
        "    <section class=\"card\">\n      <h2>Testimonials</h2>\n      <div class=\"testis\">{quotes}</div>\n    </section>\n"
    )
}

fn render_gallery(gallery: &[String]) -> String {
    if gallery.is_empty() {
        return String::new();
    }
    let figures: String = gallery
        .iter()
        .map(|src| {
            format!(
                r#"<figure class="thumb"><img src="{}" alt="Gallery image"></figure>"#,
                escape(src)
            )
        })
        .collect();
    format!(
        "    <section class=\"card\">\n      <h2>Gallery</h2>\n      <div class=\"grid\">{figures}</div>\n    </section>\n"
    )
}

fn render_hours(site: &SiteData) -> String {
    if site.hours.is_empty() && site.address.is_none() {
        return String::new();
    }
    let hours = if site.hours.is_empty() {
        String::new()
    } else {
        let items: String = site
            .hours
            .iter()
            .map(|line| format!("<li>{}</li>", escape(line)))
            .collect();
        format!(r#"<ul class="list">{items}</ul>"#)
    };
    let address = site
        .address
        .as_deref()
        .map(|address| format!(r#"<p class="address">{}</p>"#, escape(address)))
        .unwrap_or_default();
    format!(
        "    <section class=\"card\">\n      <h2>Hours &amp; Location</h2>\n      {hours}{address}\n    </section>\n"
    )
}

fn render_contact(site: &SiteData) -> String {
    let mut bits = Vec::new();
    if let Some(email) = &site.email {
        let email = escape(email);
        bits.push(format!(
            r#"<a class="contact" href="mailto:{email}">Email: {email}</a>"#
        ));
    }
    if let Some(phone) = &site.phone {
        bits.push(format!(
            r#"<span class="contact">Phone: {}</span>"#,
            escape(phone)
        ));
    }
    if let Some(url) = site.instagram.as_deref().and_then(instagram_url) {
        bits.push(format!(
            r#"<a class="contact" href="{}" target="_blank" rel="noopener">Instagram</a>"#,
            escape(&url)
        ));
    }
    let body = if bits.is_empty() {
        "<p>Reach out any time.</p>".to_string()
    } else {
        bits.join(" ")
    };
    format!(
        "    <section class=\"card\">\n      <h2>Contact</h2>\n      {body}\n    </section>\n"
    )
}

fn is_http_url(raw: &str) -> bool {
    raw.starts_with("https://") || raw.starts_with("http://")
}

fn is_analytics_id(raw: &str) -> bool {
    !raw.is_empty() && raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Full URLs pass through; bare handles (`@shop`, `shop.co`) map to an instagram.com profile.
fn instagram_url(raw: &str) -> Option<String> {
    if is_http_url(raw) {
        return Some(raw.to_string());
    }
    let handle = raw.trim_start_matches('@');
    let valid = !handle.is_empty()
        && handle
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_');
    valid.then(|| format!("https://instagram.com/{handle}"))
}
