use serde::Serialize;

use rollcall_store::{Campaign, OptIn, Store};

use crate::error::Result;

/// Discord's per-message ceiling, in Unicode code points.
pub const MAX_MESSAGE_CODEPOINTS: usize = 2000;

const CONTINUATION_MARKER: &str = " (cont.)";
const DEFAULT_TITLE: &str = "your event";

/// A ready-to-send broadcast: ordered chunks, each within the ceiling.
#[derive(Debug, Clone, Serialize)]
pub struct Broadcast {
    pub chunks: Vec<String>,
    pub recipient_count: u32,
}

/// Assemble the reminder broadcast for a campaign.
///
/// Pure apart from store reads: loads the campaign and its roster, then
/// chunks header + mention tokens under [`MAX_MESSAGE_CODEPOINTS`].
/// An empty roster yields `chunks = []` (the committed empty policy).
pub fn build(store: &Store, campaign_id: i64, template: Option<&str>) -> Result<Broadcast> {
    let campaign = store.get_campaign(campaign_id)?;
    let optins = store.all_opt_ins(campaign_id)?;
    Ok(assemble(&campaign, &optins, template))
}

/// Per-chunk text around the mention run.
///
/// A template is rendered with `{title}` and `{total_optins}`; an optional
/// `{mentions}` marker splits it into a prefix and a suffix that frame the
/// mentions in every chunk. Without a template the prefix is the default
/// header and mentions follow on their own line.
struct Layout {
    prefix: String,
    cont_prefix: String,
    /// Between prefix and the first mention of a chunk.
    sep: &'static str,
    cont_sep: &'static str,
    suffix: String,
}

fn layout(campaign: &Campaign, template: Option<&str>, total: usize) -> Layout {
    let title = campaign.title.as_deref().unwrap_or(DEFAULT_TITLE);
    let (prefix, sep, cont_sep, suffix) = match template {
        Some(t) => {
            let rendered = t
                .replace("{title}", title)
                .replace("{total_optins}", &total.to_string());
            match rendered.split_once("{mentions}") {
                Some((pre, post)) => (pre.to_string(), "", " ", post.to_string()),
                None => (rendered, "\n", "\n", String::new()),
            }
        }
        None => (format!("Reminder: {title}"), "\n", "\n", String::new()),
    };
    let cont_prefix = format!("{}{CONTINUATION_MARKER}", prefix.trim_end());
    Layout {
        prefix,
        cont_prefix,
        sep,
        cont_sep,
        suffix,
    }
}

fn assemble(campaign: &Campaign, optins: &[OptIn], template: Option<&str>) -> Broadcast {
    let recipient_count = optins.len() as u32;
    if optins.is_empty() {
        return Broadcast {
            chunks: Vec::new(),
            recipient_count,
        };
    }

    let lay = layout(campaign, template, optins.len());
    let suffix_len = cp(&lay.suffix);

    let mut chunks: Vec<String> = Vec::new();
    let mut buf = ChunkBuf::open(&lay.prefix, lay.sep);

    for opt in optins {
        let token = format!("<@{}>", opt.user_id);
        let token_len = cp(&token);

        if buf.fits(token_len, suffix_len) {
            buf.push(&token, token_len);
            continue;
        }

        if buf.has_mention {
            chunks.push(buf.close(&lay.suffix));
            buf = ChunkBuf::open(&lay.cont_prefix, lay.cont_sep);
            if buf.fits(token_len, suffix_len) {
                buf.push(&token, token_len);
                continue;
            }
        }

        // Degenerate: the token alone overflows a fresh chunk. The ceiling
        // is the invariant, not token integrity; split at char boundaries.
        let mut rest = token.as_str();
        loop {
            let capacity = MAX_MESSAGE_CODEPOINTS
                .saturating_sub(buf.len + suffix_len)
                .max(1);
            let rest_len = cp(rest);
            if rest_len <= capacity {
                buf.push(rest, rest_len);
                break;
            }
            let (head, tail) = split_at_codepoint(rest, capacity);
            buf.push(head, capacity);
            chunks.push(buf.close(&lay.suffix));
            buf = ChunkBuf::open(&lay.cont_prefix, lay.cont_sep);
            rest = tail;
        }
    }

    chunks.push(buf.close(&lay.suffix));
    Broadcast {
        chunks,
        recipient_count,
    }
}

struct ChunkBuf {
    text: String,
    /// Code points, not bytes.
    len: usize,
    has_mention: bool,
}

impl ChunkBuf {
    fn open(prefix: &str, sep: &str) -> Self {
        let mut text = String::with_capacity(MAX_MESSAGE_CODEPOINTS);
        text.push_str(prefix);
        text.push_str(sep);
        let len = cp(&text);
        Self {
            text,
            len,
            has_mention: false,
        }
    }

    fn fits(&self, token_len: usize, suffix_len: usize) -> bool {
        let sep = usize::from(self.has_mention);
        self.len + sep + token_len + suffix_len <= MAX_MESSAGE_CODEPOINTS
    }

    fn push(&mut self, token: &str, token_len: usize) {
        if self.has_mention {
            self.text.push(' ');
            self.len += 1;
        }
        self.text.push_str(token);
        self.len += token_len;
        self.has_mention = true;
    }

    fn close(mut self, suffix: &str) -> String {
        self.text.push_str(suffix);
        self.text
    }
}

fn cp(s: &str) -> usize {
    s.chars().count()
}

fn split_at_codepoint(s: &str, n: usize) -> (&str, &str) {
    let byte = s
        .char_indices()
        .nth(n)
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s.split_at(byte)
}
