//! Redirects on a session: creating them from the shared patterns, and handing their outcome to
//! observers (or to the notify list, for its own polls).
use super::Server;
use crate::client::event::Event;
use crate::client::redirect::RedirectOutput;
use crate::error::{Error, Result};

impl Server {
    /// Redirects the replies to the next line sent. `string` is the value some reply parameters
    /// must have (a nick, a channel), `cmd_filter` the comma separated commands to keep.
    pub fn redirect(
        &mut self,
        pattern: &str,
        signal: &str,
        count: u32,
        string: Option<&str>,
        timeout: i64,
        cmd_filter: Option<&str>,
    ) -> Result<u64> {
        let found = {
            let mut patterns = self.ctx.redirect_patterns.lock();
            let index = patterns.iter().position(|p| p.name == pattern);
            match index {
                Some(index) if patterns[index].temp => Some(patterns.remove(index)),
                Some(index) => Some(patterns[index].clone()),
                None => None,
            }
        };
        let pattern = found.ok_or_else(|| Error::UnknownRedirectPattern {
            name: pattern.to_owned(),
        })?;
        let timeout = if timeout > 0 {
            timeout
        } else {
            self.ctx.config.redirect_timeout()
        };
        Ok(self.redirects.add(&pattern, signal, count, string, timeout, cmd_filter))
    }

    pub(crate) fn redirect_finished(&mut self, done: RedirectOutput) {
        debug!(
            "[{}] redirect {} ({}) done{}",
            self.name,
            done.pattern,
            done.signal,
            if done.timed_out { " (timeout)" } else { "" }
        );
        if done.signal == "notify" {
            self.notify_redirected(&done.pattern, &done.command, &done.output);
        }
        self.ctx.emit(Event::Redirected {
            server: self.name.clone(),
            pattern: done.pattern,
            signal: done.signal,
            command: done.command,
            output: done.output,
            timed_out: done.timed_out,
        });
    }
}
