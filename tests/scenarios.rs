//! End-to-end scenarios on one session, driven by wire lines and a manual clock.
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use parking_lot::Mutex;

use irc_session::client::clock::Clock;
use irc_session::client::context::Context;
use irc_session::client::data::join::{self, JoinEntry, JoinList, JoinSort};
use irc_session::client::data::{Config, ServerConfig};
use irc_session::client::event::{Event, SessionState};
use irc_session::client::outqueue::Priority;
use irc_session::client::server::{Action, Server};
use irc_session::client::ui::{MemoryUi, Ui};
use irc_session::proto::CaseMapping;

struct Session {
    server: Server,
    ui: Arc<Mutex<MemoryUi>>,
    clock: Clock,
    events: Arc<Mutex<Vec<Event>>>,
}

impl Session {
    fn new(config: ServerConfig) -> Session {
        let _ = env_logger::builder().is_test(true).try_init();
        let ui = Arc::new(Mutex::new(MemoryUi::new()));
        let shared: Arc<Mutex<dyn Ui + Send>> = ui.clone();
        let clock = Clock::manual(Utc.ymd(2021, 6, 1).and_hms(12, 0, 0));
        let ctx = Context::with_ui(Config::default(), shared, clock.clone());
        let events = Arc::new(Mutex::new(vec![]));
        let log = events.clone();
        ctx.subscribe(move |e: &Event| log.lock().push(e.clone()));
        Session {
            server: Server::new(ctx, config),
            ui,
            clock,
            events,
        }
    }

    fn recv(&mut self, line: &str) {
        self.server.recv_line(line);
    }

    fn sent(&mut self) -> Vec<String> {
        self.server
            .take_actions()
            .into_iter()
            .filter_map(|a| match a {
                Action::Send(line) => Some(line),
                _ => None,
            })
            .collect()
    }

    fn connect(&mut self) {
        self.server.connect().unwrap();
        self.server.connected();
    }

    fn register(&mut self) {
        self.connect();
        self.recv(":irc.test.net 001 test :Welcome to the test network");
        self.sent();
    }
}

fn config() -> ServerConfig {
    ServerConfig {
        name: "test".to_owned(),
        addresses: Some(vec!["irc.test.net/6667".to_owned()]),
        nicks: Some(vec!["test".to_owned()]),
        realname: Some("Testing.".to_owned()),
        capabilities: Some(String::new()),
        ..ServerConfig::default()
    }
}

fn joins(lines: &[String]) -> usize {
    lines.iter().filter(|l| l.starts_with("JOIN")).count()
}

#[test]
fn sasl_success_comes_before_autojoin() {
    let mut config = config();
    config.capabilities = Some("multi-prefix".to_owned());
    config.sasl_username = Some("test".to_owned());
    config.sasl_password = Some("secret".to_owned());
    config.autojoin = Some("#rust".to_owned());
    let mut s = Session::new(config);
    let mut before_success = vec![];

    s.connect();
    before_success.extend(s.sent());
    s.recv(":irc.test.net CAP * LS :sasl multi-prefix");
    let req = s.sent();
    assert_eq!(req.len(), 1);
    assert!(req[0].starts_with("CAP REQ :"));
    assert!(req[0].contains("sasl") && req[0].contains("multi-prefix"));
    before_success.extend(req);

    s.recv(":irc.test.net CAP test ACK :multi-prefix sasl");
    let auth = s.sent();
    assert_eq!(auth, vec!["AUTHENTICATE PLAIN".to_owned()]);
    before_success.extend(auth);

    s.recv("AUTHENTICATE +");
    let credentials = s.sent();
    assert_eq!(credentials, vec!["AUTHENTICATE dGVzdAB0ZXN0AHNlY3JldA==".to_owned()]);
    before_success.extend(credentials);
    assert_eq!(joins(&before_success), 0);

    s.recv(":irc.test.net 900 test test!t@host test :You are now logged in as test");
    s.recv(":irc.test.net 903 test :SASL authentication successful");
    assert_eq!(s.sent(), vec!["CAP END".to_owned()]);
    assert!(s.server.is_authenticated());

    s.recv(":irc.test.net 001 test :Welcome to the test network");
    assert_eq!(s.sent(), vec!["JOIN #rust".to_owned()]);
}

#[test]
fn reconnect_delay_doubles_then_resets() {
    let mut s = Session::new(config());
    s.register();

    let mut delays = vec![];
    s.server.socket_closed();
    delays.push(s.server.reconnect_delay());
    for _ in 0..2 {
        s.clock.advance(s.server.reconnect_delay());
        s.server.timer();
        assert_eq!(s.server.state(), SessionState::Connecting);
        s.server.connected();
        s.server.socket_closed();
        delays.push(s.server.reconnect_delay());
    }
    assert_eq!(delays, vec![10, 20, 40]);

    s.clock.advance(40);
    s.server.timer();
    s.server.connected();
    s.recv(":irc.test.net 001 test :Welcome back");
    assert_eq!(s.server.state(), SessionState::Registered);
    s.server.socket_closed();
    assert_eq!(s.server.reconnect_delay(), 10);

    let scheduled: Vec<i64> = s
        .events
        .lock()
        .iter()
        .filter_map(|e| match e {
            Event::ReconnectScheduled { delay, .. } => Some(*delay),
            _ => None,
        })
        .collect();
    assert_eq!(scheduled, vec![10, 20, 40, 10]);
}

#[test]
fn smart_filtered_join_is_unmasked_when_the_nick_speaks() {
    let mut s = Session::new(config());
    s.register();
    s.recv(":test!t@me.host JOIN #chan");
    s.recv(":irc.test.net 353 test = #chan :@test bob");
    s.recv(":irc.test.net 366 test #chan :End of /NAMES list.");

    s.recv(":alice!a@alice.host JOIN #chan");
    let join_filtered = |s: &Session| {
        s.ui.lock()
            .lines("test.#chan")
            .iter()
            .find(|l| l.has_tag("irc_join") && l.has_tag("nick_alice"))
            .map(|l| l.has_tag("irc_smart_filter"))
    };
    assert_eq!(join_filtered(&s), Some(true));

    s.clock.advance(120);
    s.recv(":alice!a@alice.host PRIVMSG #chan :hello");
    assert_eq!(join_filtered(&s), Some(false));
    let chan = s.server.channel_search("#chan").unwrap();
    assert!(chan.join_smart_filtered().is_empty());
}

#[test]
fn bans_are_batched_by_max_modes() {
    let mut config = config();
    config.anti_flood_prio_low = Some(2);
    let mut s = Session::new(config);
    s.register();
    s.recv(":irc.test.net 005 test MODES=3 PREFIX=(ov)@+ :are supported by this server");
    s.recv(":test!t@me.host JOIN #chan");
    s.recv(":irc.test.net 366 test #chan :End of /NAMES list.");
    s.sent();
    s.clock.advance(2);

    let masks = ["a!*@*", "b!*@*", "c!*@*", "d!*@*", "e!*@*", "f!*@*", "g!*@*"];
    let lines = s.server.send_mode_masks("#chan", true, 'b', &masks).unwrap();
    assert_eq!(
        lines,
        vec![
            "MODE #chan +bbb a!*@* b!*@* c!*@*".to_owned(),
            "MODE #chan +bbb d!*@* e!*@* f!*@*".to_owned(),
            "MODE #chan +b g!*@*".to_owned(),
        ]
    );
    assert_eq!(s.sent(), vec!["MODE #chan +bbb a!*@* b!*@* c!*@*".to_owned()]);
    assert_eq!(s.server.outqueue().len(Priority::High), 0);
    assert_eq!(s.server.outqueue().len(Priority::Low), 2);
}

#[test]
fn join_list_round_trip_keeps_pairs() {
    let casemap = CaseMapping::Rfc1459;
    for text in &["#a,#b,#c", "#a,#b,#c k1,k2", "#x,#y k", "&local,#chan key"] {
        let entries = join::split(casemap, text, JoinSort::Disabled);
        let rebuilt = join::build(&entries);
        let again = join::split(casemap, &rebuilt, JoinSort::Disabled);
        assert_eq!(entries, again, "{}", text);
        let keyed = entries.iter().take_while(|e| e.key.is_some()).count();
        assert!(entries[keyed..].iter().all(|e| e.key.is_none()));
    }
}

#[test]
fn join_list_add_is_idempotent() {
    let casemap = CaseMapping::Rfc1459;
    let mut list = JoinList::split(casemap, JoinSort::Disabled, "#a,#b");
    list.add(JoinEntry::new("#c", Some("k")));
    list.add(JoinEntry::new("#C", Some("k")));
    let c: Vec<_> = list.entries().iter().filter(|e| casemap.eq(&e.name, "#c")).collect();
    assert_eq!(c.len(), 1);
    assert_eq!(c[0].key.as_deref(), Some("k"));
    assert_eq!(list.build(), "#C,#a,#b k");
}

#[test]
fn join_list_rename_collision_drops_the_old_name() {
    let casemap = CaseMapping::Rfc1459;
    let join = join::add(casemap, "#b,#c", "#a", None);
    assert_eq!(join::rename(casemap, &join, "#a", "#b"), "#b,#c");
    assert_eq!(join::rename(casemap, "#a,#c", "#a", "#b"), "#b,#c");
}
