//! HTML for the index, the editing panel and the not-found page

use html_escape::{encode_double_quoted_attribute, encode_text};

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0; background: #f4f5f7; color: #222; }
header { background: #23395d; color: #fff; padding: 0.8rem 1.2rem; }
header a { color: #fff; text-decoration: none; }
main { padding: 1.2rem; }
.layout { display: grid; grid-template-columns: 1fr 360px; gap: 1rem; }
iframe { width: 100%; height: 80vh; border: 1px solid #ccc; background: #fff; }
form.tool { background: #fff; border: 1px solid #ddd; padding: 0.6rem; margin-bottom: 0.6rem; }
form.tool h3 { margin: 0 0 0.4rem; font-size: 1rem; }
#status { min-height: 1.4rem; font-weight: bold; }
"#;

fn page(title: &str, body: &str, head_extra: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="pt-BR">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>{style}</style>
{head_extra}
</head>
<body>
<header><a href="/">PDF Wizard</a></header>
<main>
{body}
</main>
</body>
</html>
"#,
        title = encode_text(title),
        style = STYLE,
        head_extra = head_extra,
        body = body,
    )
}

/// Landing page with the upload form
pub fn index_page() -> String {
    page(
        "PDF Wizard",
        r#"<h1>Envie um PDF</h1>
<form action="/upload" method="post" enctype="multipart/form-data">
  <input type="file" name="file" accept=".pdf,application/pdf" required>
  <button type="submit">Enviar</button>
</form>"#,
        "",
    )
}

/// Shown when the panel is opened for a document that does not exist
pub fn not_found_page(filename: &str) -> String {
    page(
        "Arquivo não encontrado",
        &format!(
            r#"<h1>Arquivo não encontrado</h1>
<p>O documento <code>{}</code> não existe.</p>
<p><a href="/">Enviar outro PDF</a></p>"#,
            encode_text(filename)
        ),
        "",
    )
}

const PANEL_SCRIPT: &str = r##"
<script>
(function () {
  const root = document.getElementById("panel");
  const filename = root.dataset.filename;
  const status = document.getElementById("status");
  const viewer = document.getElementById("viewer");

  function reloadViewer() {
    viewer.src = "/view/" + encodeURIComponent(filename) + "?t=" + Date.now();
  }

  document.querySelectorAll("form.tool").forEach(function (form) {
    form.addEventListener("submit", async function (event) {
      event.preventDefault();
      const body = new FormData(form);
      body.append("filename", filename);
      status.textContent = "Processando...";

      const response = await fetch(form.dataset.endpoint, { method: "POST", body: body });
      const type = response.headers.get("content-type") || "";

      if (type.startsWith("image/png")) {
        const blob = await response.blob();
        const link = document.createElement("a");
        link.href = URL.createObjectURL(blob);
        const match = /filename="([^"]+)"/.exec(response.headers.get("content-disposition") || "");
        link.download = match ? match[1] : "pagina.png";
        link.click();
        status.textContent = "Página exportada.";
        return;
      }

      const reply = await response.json();
      if (!reply.ok) {
        status.textContent = reply.msg;
        return;
      }
      if (reply.text !== undefined) {
        if (window.tinymce && tinymce.get("text-editor")) {
          tinymce.get("text-editor").setContent("<pre>" + reply.text.replace(/&/g, "&amp;").replace(/</g, "&lt;") + "</pre>");
        } else {
          document.getElementById("text-editor").value = reply.text;
        }
        status.textContent = "Texto extraído.";
        return;
      }
      status.textContent = reply.msg;
      reloadViewer();
    });
  });

  if (window.tinymce) {
    tinymce.init({ selector: "#text-editor", height: 300, menubar: false });
  }
})();
</script>
"##;

/// Editing panel for one document
pub fn panel_page(filename: &str, editor_api_key: &str) -> String {
    let encoded = urlencoding::encode(filename);
    let editor_src = format!(
        "https://cdn.tiny.cloud/1/{}/tinymce/6/tinymce.min.js",
        urlencoding::encode(editor_api_key)
    );

    let body = format!(
        r#"<h1>{title}</h1>
<div id="panel" class="layout" data-filename="{filename_attr}">
  <section>
    <iframe id="viewer" src="/view/{encoded}"></iframe>
    <p><a href="/download/{encoded}">Baixar PDF</a></p>
  </section>
  <aside>
    <div id="status"></div>
    <form class="tool" data-endpoint="/api/rotate">
      <h3>Rotacionar</h3>
      <select name="degrees">
        <option value="90">90°</option>
        <option value="180">180°</option>
        <option value="270">270°</option>
        <option value="-90">-90°</option>
      </select>
      <button type="submit">Aplicar</button>
    </form>
    <form class="tool" data-endpoint="/api/watermark">
      <h3>Marca d'água</h3>
      <input type="text" name="text" placeholder="PDF Wizard">
      <button type="submit">Aplicar</button>
    </form>
    <form class="tool" data-endpoint="/api/insert_image">
      <h3>Inserir imagem</h3>
      <input type="file" name="image" accept="image/*">
      <label>Página <input type="number" name="page" value="1" min="1"></label>
      <label>x <input type="number" name="x" value="50" step="any"></label>
      <label>y <input type="number" name="y" value="50" step="any"></label>
      <label>largura <input type="number" name="w" value="200" step="any"></label>
      <button type="submit">Inserir</button>
    </form>
    <form class="tool" data-endpoint="/api/merge">
      <h3>Mesclar PDFs</h3>
      <input type="file" name="files" accept=".pdf,application/pdf" multiple>
      <button type="submit">Mesclar</button>
    </form>
    <form class="tool" data-endpoint="/api/page_png">
      <h3>Exportar página como PNG</h3>
      <label>Página <input type="number" name="page" value="1" min="1"></label>
      <button type="submit">Exportar</button>
    </form>
    <form class="tool" data-endpoint="/api/extract_text">
      <h3>Extrair texto</h3>
      <button type="submit">Extrair</button>
    </form>
    <textarea id="text-editor" rows="12" style="width: 100%"></textarea>
  </aside>
</div>
{script}"#,
        title = encode_text(filename),
        filename_attr = encode_double_quoted_attribute(filename),
        encoded = encoded,
        script = PANEL_SCRIPT,
    );

    let head_extra = format!(
        r#"<script src="{}" referrerpolicy="origin"></script>"#,
        encode_double_quoted_attribute(&editor_src)
    );

    page(filename, &body, &head_extra)
}
