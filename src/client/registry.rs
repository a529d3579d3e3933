//! The set of server sessions sharing one context.
use std::io::{BufRead, Write};

use crate::client::context::Context;
use crate::client::data::{Config, ServerConfig};
use crate::client::event::SessionState;
use crate::client::server::{snapshot, Action, Server};
use crate::client::ui::{BufferId, Ui};
use crate::error::{Error, Result};

/// Every server session, in creation order.
pub struct Registry {
    ctx: Context,
    servers: Vec<Server>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new(ctx: Context) -> Registry {
        Registry { ctx, servers: vec![] }
    }

    /// Creates a registry holding one session per configured server.
    pub fn from_config<U>(config: Config, ui: U) -> Result<Registry>
    where
        U: Ui + Send + 'static,
    {
        config.validate()?;
        let servers = config.servers().to_vec();
        let mut registry = Registry::new(Context::new(config, ui));
        for server in servers {
            registry.add(server)?;
        }
        Ok(registry)
    }

    /// The shared context.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Every session.
    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    /// Every session, mutably.
    pub fn servers_mut(&mut self) -> &mut [Server] {
        &mut self.servers
    }

    /// Finds a session by name.
    pub fn search(&self, name: &str) -> Option<&Server> {
        self.servers.iter().find(|s| s.name() == name)
    }

    /// Finds a session by name, mutably.
    pub fn search_mut(&mut self, name: &str) -> Option<&mut Server> {
        self.servers.iter_mut().find(|s| s.name() == name)
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.servers
            .iter()
            .position(|s| s.name() == name)
            .ok_or_else(|| Error::ServerNotFound { name: name.to_owned() })
    }

    fn check_free(&self, name: &str) -> Result<()> {
        if self.search(name).is_some() {
            return Err(Error::ServerExists { name: name.to_owned() });
        }
        Ok(())
    }

    /// Adds a disconnected session.
    pub fn add(&mut self, config: ServerConfig) -> Result<&mut Server> {
        self.check_free(&config.name)?;
        info!("server added: {}", config.name);
        self.servers.push(Server::new(self.ctx.clone(), config));
        let index = self.servers.len() - 1;
        Ok(&mut self.servers[index])
    }

    /// Adds a session configured like `name`.
    pub fn copy(&mut self, name: &str, new_name: &str) -> Result<&mut Server> {
        let index = self.position(name)?;
        let mut config = self.servers[index].config().clone();
        config.name = new_name.to_owned();
        self.add(config)
    }

    /// Renames a session and its buffers.
    pub fn rename(&mut self, name: &str, new_name: &str) -> Result<()> {
        let index = self.position(name)?;
        self.check_free(new_name)?;
        info!("server renamed: {} => {}", name, new_name);
        self.servers[index].rename(new_name);
        Ok(())
    }

    /// Deletes a disconnected session and closes its buffers.
    pub fn delete(&mut self, name: &str) -> Result<Server> {
        let index = self.position(name)?;
        if self.servers[index].state() != SessionState::Disconnected {
            return Err(Error::ServerConnected { name: name.to_owned() });
        }
        let mut server = self.servers.remove(index);
        if let Some(buffer) = server.buffer() {
            server.buffer_closed(buffer);
            self.ctx.ui.lock().buffer_close(buffer);
        }
        info!("server deleted: {}", name);
        Ok(server)
    }

    /// Connects every session configured to connect on startup.
    pub fn connect_auto(&mut self) {
        for server in self.servers.iter_mut().filter(|s| s.config().autoconnect()) {
            if let Err(e) = server.connect() {
                warn!("[{}] autoconnect: {}", server.name(), e);
            }
        }
    }

    /// The UI closed a buffer; the session owning it reacts.
    pub fn buffer_closed(&mut self, buffer: BufferId) {
        for server in &mut self.servers {
            server.buffer_closed(buffer);
        }
    }

    /// Runs the timer of every session.
    pub fn timer(&mut self) {
        for server in &mut self.servers {
            server.timer();
        }
    }

    /// Takes the pending transport actions of every session.
    pub fn take_actions(&mut self) -> Vec<(String, Action)> {
        self.servers
            .iter_mut()
            .flat_map(|s| {
                let name = s.name().to_owned();
                s.take_actions().into_iter().map(move |a| (name.clone(), a))
            })
            .collect()
    }

    /// Quits every connected session and stops reconnections.
    pub fn shutdown(&mut self, reason: Option<&str>) {
        for server in &mut self.servers {
            server.shutdown(reason);
        }
    }

    /// Whether every session is disconnected.
    pub fn all_disconnected(&self) -> bool {
        self.servers.iter().all(|s| s.state() == SessionState::Disconnected)
    }

    /// Writes an upgrade snapshot of every session.
    pub fn save_snapshot<W: Write>(&self, writer: W) -> Result<()> {
        snapshot::save(&self.ctx, &self.servers, writer)
    }

    /// Rebuilds a registry from an upgrade snapshot. Restored sessions that were connected
    /// reconnect on the first timer tick and rejoin their channels.
    pub fn restore<R: BufRead>(ctx: Context, reader: R) -> Result<Registry> {
        let servers = snapshot::load(&ctx, reader)?;
        info!("upgrade: {} server(s) restored", servers.len());
        Ok(Registry { ctx, servers })
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;

    use super::Registry;
    use crate::client::clock::Clock;
    use crate::client::context::Context;
    use crate::client::data::{Config, ServerConfig};
    use crate::client::event::SessionState;
    use crate::client::server::Action;
    use crate::client::ui::{MemoryUi, Ui};
    use crate::error::Error;

    fn registry() -> (Registry, Arc<Mutex<MemoryUi>>) {
        let ui = Arc::new(Mutex::new(MemoryUi::new()));
        let shared: Arc<Mutex<dyn Ui + Send>> = ui.clone();
        let clock = Clock::manual(Utc.ymd(2021, 6, 1).and_hms(12, 0, 0));
        let ctx = Context::with_ui(Config::default(), shared, clock);
        let mut registry = Registry::new(ctx);
        registry.add(ServerConfig::new("libera", "irc.libera.chat/6697")).unwrap();
        (registry, ui)
    }

    #[test]
    fn names_are_unique() {
        let (mut registry, _) = registry();
        match registry.add(ServerConfig::new("libera", "other/6667")) {
            Err(Error::ServerExists { name }) => assert_eq!(name, "libera"),
            _ => panic!("duplicate accepted"),
        }
        registry.copy("libera", "libera2").unwrap();
        assert_eq!(registry.search("libera2").unwrap().config().addresses()[0].1, 6697);
        assert!(registry.copy("nope", "x").is_err());
        assert!(registry.rename("libera2", "libera").is_err());
    }

    #[test]
    fn rename_moves_buffers() {
        let (mut registry, ui) = registry();
        registry.search_mut("libera").unwrap().create_buffer();
        registry.rename("libera", "lib").unwrap();
        assert!(registry.search("libera").is_none());
        assert_eq!(registry.search("lib").unwrap().config().name, "lib");
        assert!(ui.lock().buffer_by_name("server.lib").is_some());
    }

    #[test]
    fn delete_refused_while_connected() {
        let (mut registry, ui) = registry();
        registry.search_mut("libera").unwrap().connect().unwrap();
        match registry.delete("libera") {
            Err(Error::ServerConnected { .. }) => (),
            _ => panic!("connected server deleted"),
        }
        registry.search_mut("libera").unwrap().disconnect(false, false);
        registry.delete("libera").unwrap();
        assert!(registry.servers().is_empty());
        assert!(ui.lock().buffer_by_name("server.libera").is_none());
    }

    #[test]
    fn actions_carry_the_server_name() {
        let (mut registry, _) = registry();
        registry.search_mut("libera").unwrap().connect().unwrap();
        let actions = registry.take_actions();
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            (name, Action::Connect { address, port, tls, .. }) => {
                assert_eq!(name, "libera");
                assert_eq!(address, "irc.libera.chat");
                assert_eq!(*port, 6697);
                assert!(!*tls);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn snapshot_round_trip_keeps_servers() {
        let (mut registry, _) = registry();
        registry.copy("libera", "oftc").unwrap();
        let mut out = vec![];
        registry.save_snapshot(&mut out).unwrap();

        let ctx = registry.context().clone();
        let restored = Registry::restore(ctx, Cursor::new(out)).unwrap();
        let names: Vec<_> = restored.servers().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["libera", "oftc"]);
        assert!(restored.all_disconnected());
        assert_eq!(restored.servers()[0].state(), SessionState::Disconnected);
    }
}
