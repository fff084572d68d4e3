use serde::Serialize;

/// Decoded feed body: channel metadata plus items in document order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeedDocument {
    pub channel: ChannelInfo,
    pub items: Vec<FeedItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelInfo {
    pub title: String,
    pub link: String,
    pub description: String,
}

/// One `<item>` as it came off the wire; only lives between fetch and write.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeedItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub pub_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    /// Link if the item had one, otherwise its title.
    pub item: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub created: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub failures: Vec<ItemFailure>,
}

impl IngestReport {
    pub(crate) fn fail(&mut self, item: String, reason: String) {
        self.failed += 1;
        self.failures.push(ItemFailure { item, reason });
    }
}
