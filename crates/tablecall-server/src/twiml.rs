//! Telephony markup (TwiML) composition.

/// Parameters for the `<Record>` verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordParams {
    pub max_length_secs: u32,
    pub timeout_secs: u32,
    /// URL the provider posts the recording to.
    pub action: String,
}

/// A single TwiML verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verb {
    Play { url: String },
    Say { text: String, voice: String },
    Record(RecordParams),
    Hangup,
}

/// An ordered `<Response>` document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceResponse {
    verbs: Vec<Verb>,
}

impl VoiceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn play(&mut self, url: impl Into<String>) -> &mut Self {
        self.verbs.push(Verb::Play { url: url.into() });
        self
    }

    pub fn say(&mut self, text: impl Into<String>, voice: impl Into<String>) -> &mut Self {
        self.verbs.push(Verb::Say {
            text: text.into(),
            voice: voice.into(),
        });
        self
    }

    pub fn record(&mut self, params: RecordParams) -> &mut Self {
        self.verbs.push(Verb::Record(params));
        self
    }

    pub fn hangup(&mut self) -> &mut Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    pub fn verbs(&self) -> &[Verb] {
        &self.verbs
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>");
        for verb in &self.verbs {
            match verb {
                Verb::Play { url } => {
                    xml.push_str("<Play>");
                    xml.push_str(&escape_xml(url));
                    xml.push_str("</Play>");
                }
                Verb::Say { text, voice } => {
                    xml.push_str("<Say voice=\"");
                    xml.push_str(&escape_xml(voice));
                    xml.push_str("\">");
                    xml.push_str(&escape_xml(text));
                    xml.push_str("</Say>");
                }
                Verb::Record(params) => {
                    xml.push_str(&format!(
                        "<Record maxLength=\"{}\" action=\"{}\" timeout=\"{}\"/>",
                        params.max_length_secs,
                        escape_xml(&params.action),
                        params.timeout_secs
                    ));
                }
                Verb::Hangup => xml.push_str("<Hangup/>"),
            }
        }
        xml.push_str("</Response>");
        xml
    }
}

/// Escapes text for use in XML content and attribute values.
pub fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_document_shape() {
        let mut response = VoiceResponse::new();
        response
            .say("Hello! Welcome to Luigi's.", "alice")
            .record(RecordParams {
                max_length_secs: 30,
                timeout_secs: 3,
                action: "/voice/webhook?reprompts=0".to_string(),
            });
        assert_eq!(
            response.to_xml(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>\
             <Say voice=\"alice\">Hello! Welcome to Luigi&apos;s.</Say>\
             <Record maxLength=\"30\" action=\"/voice/webhook?reprompts=0\" timeout=\"3\"/>\
             </Response>"
        );
    }

    #[test]
    fn play_and_hangup_escape_urls() {
        let mut response = VoiceResponse::new();
        response
            .play("https://calls.example.com/voice/audio/a?x=1&y=2")
            .hangup();
        let xml = response.to_xml();
        assert!(xml.contains("<Play>https://calls.example.com/voice/audio/a?x=1&amp;y=2</Play>"));
        assert!(xml.ends_with("<Hangup/></Response>"));
        assert_eq!(response.verbs().len(), 2);
    }

    #[test]
    fn escape_handles_markup() {
        assert_eq!(escape_xml("<b>\"fish & chips\"</b>"), "&lt;b&gt;&quot;fish &amp; chips&quot;&lt;/b&gt;");
    }
}
