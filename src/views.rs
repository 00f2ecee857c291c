//! Bare HTML pages for the intake form. Every interpolated value goes
//! through [`escape`].

use std::collections::BTreeMap;

use crate::{catalog::CatalogEntry, config::BrokerSummary};

const PREVIEW_SCRIPT: &str = r#"<script>
document.addEventListener('DOMContentLoaded', function () {
  var select = document.getElementById('messageSelect');
  var preview = document.getElementById('contentPreview');
  var submit = document.getElementById('submitBtn');
  select.addEventListener('change', function () {
    var option = select.options[select.selectedIndex];
    preview.value = option.dataset.content || '';
    submit.disabled = !select.value;
  });
});
</script>"#;

pub fn escape(text: &str) -> String {
    ammonia::clean_text(text)
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape(title),
        body
    )
}

fn broker_block(broker: &BrokerSummary) -> String {
    let mut out = format!(
        "<dl class=\"broker\">\n<dt>Broker</dt><dd>{}</dd>\n<dt>Topic</dt><dd>{}</dd>\n",
        escape(&broker.broker),
        escape(&broker.topic)
    );
    if let Some(protocol) = &broker.security_protocol {
        out.push_str(&format!(
            "<dt>Security Protocol</dt><dd>{}</dd>\n",
            escape(protocol)
        ));
    }
    if let Some(mechanism) = &broker.sasl_mechanism {
        out.push_str(&format!(
            "<dt>SASL Mechanism</dt><dd>{}</dd>\n",
            escape(mechanism)
        ));
    }
    out.push_str("</dl>");
    out
}

pub fn index_page(entries: &BTreeMap<String, CatalogEntry>, broker: &BrokerSummary) -> String {
    let options: String = entries
        .values()
        .map(|entry| {
            format!(
                "<option value=\"{}\" data-content=\"{}\">{}</option>\n",
                escape(&entry.filename),
                escape(&entry.content),
                escape(&entry.display_name)
            )
        })
        .collect();

    let body = format!(
        "<h1>Message Intake</h1>\n<p>Select and submit customer support messages to Kafka</p>\n{}\n\
         <form method=\"post\" action=\"/submit\">\n\
         <select id=\"messageSelect\" name=\"selectedFile\">\n<option value=\"\">Choose a message</option>\n{}</select>\n\
         <textarea id=\"contentPreview\" name=\"content\" rows=\"10\"></textarea>\n\
         <button id=\"submitBtn\" type=\"submit\" disabled>Submit to Kafka</button>\n\
         </form>\n{}",
        broker_block(broker),
        options,
        PREVIEW_SCRIPT
    );
    layout("Message Intake", &body)
}

pub fn success_page(id: &str, file: &str, submitted_at: &str, broker: &BrokerSummary) -> String {
    let body = format!(
        "<h1>Message submitted</h1>\n<dl>\n<dt>Message ID</dt><dd id=\"messageId\">{}</dd>\n\
         <dt>File</dt><dd id=\"fileName\">{}</dd>\n<dt>Time</dt><dd>{}</dd>\n</dl>\n{}\n\
         <a href=\"/\">Submit another message</a>",
        escape(id),
        escape(file),
        escape(submitted_at),
        broker_block(broker)
    );
    layout("Success", &body)
}

pub fn error_page(reason: &str, broker: &BrokerSummary) -> String {
    let body = format!(
        "<h1>Submission failed</h1>\n<p id=\"errorMessage\">{}</p>\n{}\n<a href=\"/\">Back</a>",
        escape(reason),
        broker_block(broker)
    );
    layout("Error", &body)
}
