//! Batches (`BATCH +ref type params...` then `BATCH -ref`): lines tagged with an open batch are
//! held, and handled in order once the batch ended and its parent batch was handled.
use super::Server;
use crate::proto::Message;

/// An open batch.
#[derive(Clone, Debug)]
pub(super) struct Batch {
    reference: String,
    parent: Option<String>,
    kind: String,
    params: Vec<String>,
    messages: Vec<Message>,
    ended: bool,
}

impl Server {
    /// Holds a line tagged with an open batch. Returns whether it was held.
    pub(super) fn batch_hold(&mut self, message: &Message) -> bool {
        if !self.caps.batch || message.command.name() == "BATCH" {
            return false;
        }
        let reference = match message.tag("batch") {
            Some(reference) => reference,
            None => return false,
        };
        match self.batches.iter_mut().find(|b| b.reference == reference) {
            Some(batch) => {
                batch.messages.push(message.clone());
                true
            }
            None => false,
        }
    }

    pub(super) fn recv_batch(&mut self, message: &Message, args: &[String]) {
        if !self.caps.batch {
            return;
        }
        let reference = match args.first() {
            Some(reference) => reference,
            None => return,
        };
        if let Some(reference) = reference.strip_prefix('+') {
            let kind = match args.get(1) {
                Some(kind) => kind.clone(),
                None => return,
            };
            if reference.is_empty() || self.batches.iter().any(|b| b.reference == reference) {
                return;
            }
            let batch = Batch {
                reference: reference.to_owned(),
                parent: message.tag("batch").map(|p| p.to_owned()),
                kind,
                params: args[2..].to_vec(),
                messages: vec![],
                ended: false,
            };
            debug!(
                "[{}] batch {} started: {} {}",
                self.name,
                batch.reference,
                batch.kind,
                batch.params.join(" ")
            );
            self.batches.push(batch);
        } else if let Some(reference) = reference.strip_prefix('-') {
            self.batch_end(reference);
        }
    }

    fn batch_end(&mut self, reference: &str) {
        match self.batches.iter_mut().find(|b| b.reference == reference) {
            Some(batch) => batch.ended = true,
            None => return,
        }
        loop {
            let batches = &self.batches;
            let ready = batches.iter().position(|b| {
                b.ended
                    && b.parent
                        .as_ref()
                        .map_or(true, |parent| !batches.iter().any(|o| &o.reference == parent))
            });
            let batch = match ready {
                Some(index) => self.batches.remove(index),
                None => break,
            };
            debug!(
                "[{}] batch {} ended: {} lines of {}",
                self.name,
                batch.reference,
                batch.messages.len(),
                batch.kind
            );
            for message in &batch.messages {
                self.dispatch_message(message);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use crate::client::server::fixture::{test_config, Harness};

    fn batch_harness() -> Harness {
        let mut h = Harness::new(test_config());
        h.connect();
        h.recv(":irc.test.net CAP * LS :batch message-tags");
        h.recv(":irc.test.net CAP test ACK :batch message-tags");
        h.recv(":irc.test.net 001 test :Welcome to the test network");
        h.recv(":test!u@h JOIN #chan");
        h.recv(":irc.test.net 353 test = #chan :test alice bob");
        h.recv(":irc.test.net 366 test #chan :End of /NAMES list.");
        h.sent();
        h
    }

    #[test]
    fn batch_lines_print_nothing() {
        let mut h = batch_harness();
        let before = h.lines("server.test").len();
        h.recv("@+typing=active :alice!a@h TAGMSG #chan");
        h.recv("BATCH +abc netsplit a.net b.net");
        h.recv("BATCH -abc");
        assert_eq!(h.lines("server.test").len(), before);
        assert_eq!(h.sent(), "");
    }

    #[test]
    fn held_lines_are_handled_at_the_end() {
        let mut h = batch_harness();
        h.recv(":irc.test.net BATCH +ns netsplit a.net b.net");
        h.recv("@batch=ns :alice!a@h QUIT :a.net b.net");
        h.recv("@batch=ns :bob!b@h QUIT :a.net b.net");
        assert!(h.server.channels()[0].nick(h.server.casemapping(), "alice").is_some());
        h.recv(":irc.test.net BATCH -ns");
        let chan = &h.server.channels()[0];
        assert!(chan.nick(h.server.casemapping(), "alice").is_none());
        assert!(chan.nick(h.server.casemapping(), "bob").is_none());
    }

    #[test]
    fn nested_batch_waits_for_its_parent() {
        let mut h = batch_harness();
        h.recv(":irc.test.net BATCH +outer example");
        h.recv("@batch=outer :irc.test.net BATCH +inner example");
        h.recv("@batch=inner :alice!a@h PRIVMSG #chan :inner");
        h.recv("@batch=outer :bob!b@h PRIVMSG #chan :outer");
        h.recv(":irc.test.net BATCH -inner");
        let lines = h.lines("test.#chan");
        assert!(!lines.iter().any(|l| l.ends_with("inner")));
        h.recv(":irc.test.net BATCH -outer");
        let lines = h.lines("test.#chan");
        let outer = lines.iter().position(|l| l == "<bob> outer");
        let inner = lines.iter().position(|l| l == "<alice> inner");
        assert!(outer.is_some() && inner.is_some());
        assert!(outer < inner);
    }

    #[test]
    fn batch_tag_ignored_without_cap() {
        let mut h = Harness::new(test_config());
        h.register();
        h.recv(":test!u@h JOIN #chan");
        h.recv("BATCH +x example");
        h.recv("@batch=x :alice!a@h PRIVMSG #chan :hello");
        assert!(h.lines("test.#chan").contains(&"<alice> hello".to_owned()));
    }

    #[test]
    fn batches_dropped_on_disconnect() {
        let mut h = batch_harness();
        h.recv("BATCH +x example");
        h.recv("@batch=x :alice!a@h PRIVMSG #chan :lost");
        h.server.disconnect(false, false);
        assert!(h.server.batches.is_empty());
    }
}
