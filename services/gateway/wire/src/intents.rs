//! Gateway intents: which event categories the client subscribes to.

use bitflags::bitflags;

bitflags! {
    /// Intent bits sent with Identify, combined with bitwise OR
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Intents: u32 {
        /// Guild create/update/delete, roles, channels, threads
        const GUILDS = 1 << 0;
        /// Member add/update/remove (privileged)
        const GUILD_MEMBERS = 1 << 1;
        /// Bans and audit log entries
        const GUILD_MODERATION = 1 << 2;
        /// Emojis, stickers and soundboard sounds
        const GUILD_EXPRESSIONS = 1 << 3;
        /// Integration updates
        const GUILD_INTEGRATIONS = 1 << 4;
        /// Webhook updates
        const GUILD_WEBHOOKS = 1 << 5;
        /// Invite create/delete
        const GUILD_INVITES = 1 << 6;
        /// Voice state updates
        const GUILD_VOICE_STATES = 1 << 7;
        /// Presence updates (privileged)
        const GUILD_PRESENCES = 1 << 8;
        /// Messages in guild channels
        const GUILD_MESSAGES = 1 << 9;
        /// Reactions in guild channels
        const GUILD_MESSAGE_REACTIONS = 1 << 10;
        /// Typing start in guild channels
        const GUILD_MESSAGE_TYPING = 1 << 11;
        /// Direct messages
        const DIRECT_MESSAGES = 1 << 12;
        /// Reactions in direct messages
        const DIRECT_MESSAGE_REACTIONS = 1 << 13;
        /// Typing start in direct messages
        const DIRECT_MESSAGE_TYPING = 1 << 14;
        /// Message content (privileged)
        const MESSAGE_CONTENT = 1 << 15;
        /// Scheduled events
        const GUILD_SCHEDULED_EVENTS = 1 << 16;
        /// Auto moderation rule changes
        const AUTO_MODERATION_CONFIGURATION = 1 << 20;
        /// Auto moderation actions
        const AUTO_MODERATION_EXECUTION = 1 << 21;
        /// Poll votes in guilds
        const GUILD_MESSAGE_POLLS = 1 << 24;
        /// Poll votes in direct messages
        const DIRECT_MESSAGE_POLLS = 1 << 25;
    }
}

impl Intents {
    /// Parse intent names such as `guild_messages` or `MESSAGE_CONTENT`
    pub fn from_names<I, S>(names: I) -> Result<Self, crate::WireError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().try_fold(Intents::empty(), |acc, name| {
            let name = name.as_ref().trim();
            Intents::from_name(&name.to_ascii_uppercase())
                .map(|bit| acc | bit)
                .ok_or_else(|| crate::WireError::Intent(name.to_string()))
        })
    }
}

impl Default for Intents {
    fn default() -> Self {
        Intents::GUILDS | Intents::GUILD_MESSAGES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_names() {
        let intents = Intents::from_names(["guilds", "guild_messages", "MESSAGE_CONTENT"]).unwrap();
        assert_eq!(intents.bits(), 1 | (1 << 9) | (1 << 15));

        let err = Intents::from_names(["guilds", "nope"]).unwrap_err();
        assert!(matches!(err, crate::WireError::Intent(name) if name == "nope"));
    }
}
