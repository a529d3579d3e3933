//! An extension trait that provides the ability to check if a string is a channel name.

/// Channel prefixes assumed until the server advertises `CHANTYPES`.
pub const DEFAULT_CHANTYPES: &str = "#&";

/// An extension trait giving strings a function to check if they are a channel.
pub trait ChannelExt {
    /// Returns true if the specified name starts with one of the default channel prefixes.
    fn is_channel_name(&self) -> bool {
        self.is_channel_name_in(DEFAULT_CHANTYPES)
    }

    /// Returns true if the name starts with one of the given channel prefixes.
    fn is_channel_name_in(&self, chantypes: &str) -> bool;
}

impl<'a> ChannelExt for &'a str {
    fn is_channel_name_in(&self, chantypes: &str) -> bool {
        self.chars().next().map_or(false, |c| chantypes.contains(c))
    }
}

impl ChannelExt for String {
    fn is_channel_name_in(&self, chantypes: &str) -> bool {
        (&self[..]).is_channel_name_in(chantypes)
    }
}
