use rss::Channel;

use super::types::{ChannelInfo, FeedDocument, FeedItem};

/// Decodes an RSS 2.0 body and unescapes HTML entities in titles and descriptions.
pub fn parse_document(xml: &[u8]) -> Result<FeedDocument, rss::Error> {
    let channel = Channel::read_from(xml)?;

    let items = channel
        .items()
        .iter()
        .map(|item| FeedItem {
            title: item.title().map(unescape),
            link: item.link().map(|l| l.trim().to_string()),
            description: item.description().map(unescape),
            pub_date: item.pub_date().map(str::to_string),
        })
        .collect();

    Ok(FeedDocument {
        channel: ChannelInfo {
            title: unescape(channel.title()),
            link: channel.link().to_string(),
            description: unescape(channel.description()),
        },
        items,
    })
}

// producers often double-encode, so the XML layer leaves `&amp;` behind
fn unescape(s: &str) -> String {
    html_escape::decode_html_entities(s).into_owned()
}
