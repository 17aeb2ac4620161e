//! Media formats for content types and `Accept` negotiation.

/// Common media formats.
///
/// [`Format::mime`] is the bare media type; the response adds a `charset`
/// parameter for text formats from its configured encoding.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Format {
    Csv,          // text/csv
    EventStream,  // text/event-stream  (SSE)
    FormData,     // application/x-www-form-urlencoded
    Html,         // text/html
    Json,         // application/json
    MsgPack,      // application/msgpack
    OctetStream,  // application/octet-stream  (binary / file download)
    Pdf,          // application/pdf
    Text,         // text/plain
    Xml,          // application/xml
}

impl Format {
    const ALL: [Format; 10] = [
        Self::Csv,
        Self::EventStream,
        Self::FormData,
        Self::Html,
        Self::Json,
        Self::MsgPack,
        Self::OctetStream,
        Self::Pdf,
        Self::Text,
        Self::Xml,
    ];

    pub fn mime(self) -> &'static str {
        match self {
            Self::Csv         => "text/csv",
            Self::EventStream => "text/event-stream",
            Self::FormData    => "application/x-www-form-urlencoded",
            Self::Html        => "text/html",
            Self::Json        => "application/json",
            Self::MsgPack     => "application/msgpack",
            Self::OctetStream => "application/octet-stream",
            Self::Pdf         => "application/pdf",
            Self::Text        => "text/plain",
            Self::Xml         => "application/xml",
        }
    }

    /// Whether a `charset` parameter belongs on this type.
    pub fn is_text(self) -> bool {
        matches!(self, Self::Csv | Self::EventStream | Self::Html | Self::Text | Self::Xml)
    }

    /// Maps a media type (parameters ignored) to a known format.
    /// `text/xml` is treated as [`Format::Xml`].
    pub fn from_mime(mime: &str) -> Option<Self> {
        let bare = mime.split(';').next().unwrap_or_default().trim();
        if bare.eq_ignore_ascii_case("text/xml") {
            return Some(Self::Xml);
        }
        Self::ALL.into_iter().find(|f| f.mime().eq_ignore_ascii_case(bare))
    }

    /// Picks the client's preferred known format from an `Accept` header.
    ///
    /// Returns `None` when nothing known is acceptable or the client accepts
    /// anything (`*/*`). `text/*` resolves to [`Format::Html`].
    pub fn negotiate(accept: &str) -> Option<Self> {
        let mut best: Option<(f32, Format)> = None;
        for entry in accept.split(',') {
            let mut parts = entry.split(';').map(str::trim);
            let mime = parts.next().unwrap_or_default();
            let q = parts
                .find_map(|p| p.strip_prefix("q="))
                .map_or(1.0, |q| q.parse::<f32>().unwrap_or(0.0));
            let format = match mime {
                "text/*" => Some(Self::Html),
                _ => Self::from_mime(mime),
            };
            if let Some(format) = format {
                if q > 0.0 && best.is_none_or(|(b, _)| q > b) {
                    best = Some((q, format));
                }
            }
        }
        best.map(|(_, f)| f)
    }
}
