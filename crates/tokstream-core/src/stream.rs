//! Stream engine: producer and consumer steps, the pump, and combinators.
//!
//! A [`Proc`] is a suspended producer. Stepping it yields the next token (or
//! none) and the continuation (or none). A step with no token but a
//! continuation is a skip; no token and no continuation is end-of-stream.
//!
//! A [`Sink`] is a suspended consumer. Feeding it a token (or `None` for
//! end-of-stream) yields the sink for the following token, or `None` once it
//! is done. Sinks never pull; they are driven by [`copy`] or [`tee`].
//!
//! Nesting is expressed by returning continuations rather than recursing,
//! so traversal depth costs heap, not call stack.

use std::collections::VecDeque;
use std::rc::Rc;

use crate::ctx::Ctx;
use crate::error::{Reason, Result};
use crate::token::{Kind, Token};

/// The outcome of one producer step.
pub type Step<'a> = (Option<Token>, Option<Proc<'a>>);

/// The outcome of feeding one token to a consumer.
pub type SinkResult<'a> = Result<Option<Sink<'a>>>;

type StepFn<'a> = Box<dyn FnOnce() -> Result<Step<'a>> + 'a>;

/// A suspended producer step.
///
/// Streams appended with [`Proc::chain`] wait in `pending`, in run order.
/// The queue travels with the stream from step to step, so chaining never
/// wraps one step inside another.
pub struct Proc<'a> {
    run: StepFn<'a>,
    pending: VecDeque<Proc<'a>>,
}

impl<'a> Proc<'a> {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<Step<'a>> + 'a,
    {
        Proc {
            run: Box::new(f),
            pending: VecDeque::new(),
        }
    }

    /// Run this step.
    pub fn step(self) -> Result<Step<'a>> {
        let Proc { run, pending } = self;
        let (token, next) = run()?;
        let next = match next {
            Some(next) => Some(next.before(pending)),
            None => pop_pending(pending),
        };
        Ok((token, next))
    }

    /// Queue `pending` to run after everything already queued here.
    fn before(mut self, mut pending: VecDeque<Proc<'a>>) -> Proc<'a> {
        if self.pending.len() <= pending.len() {
            while let Some(own) = self.pending.pop_back() {
                pending.push_front(own);
            }
            self.pending = pending;
        } else {
            self.pending.append(&mut pending);
        }
        self
    }

    /// Run steps until a token is produced or the stream ends.
    pub fn next_token(self) -> Result<Step<'a>> {
        let mut proc = self;
        loop {
            match proc.step()? {
                (None, Some(next)) => proc = next,
                step => return Ok(step),
            }
        }
    }

    /// An exhausted stream.
    pub fn empty() -> Self {
        Proc::new(|| Ok((None, None)))
    }

    /// A stream of one token, followed by `cont`.
    pub fn once(token: Token, cont: Option<Proc<'a>>) -> Self {
        Proc::new(move || Ok((Some(token), cont)))
    }

    /// A stream that fails on its first step.
    pub fn fail(err: crate::error::Error) -> Self {
        Proc::new(move || Err(err))
    }

    /// Replay a buffered token sequence.
    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        Self::from_iterator(tokens)
    }

    /// Pull tokens lazily from an iterator.
    pub fn from_iterator<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Token>,
        I::IntoIter: 'a,
    {
        fn go<'a, I: Iterator<Item = Token> + 'a>(mut iter: I) -> Proc<'a> {
            Proc::new(move || match iter.next() {
                Some(token) => Ok((Some(token), Some(go(iter)))),
                None => Ok((None, None)),
            })
        }
        go(iter.into_iter())
    }

    /// Run `cont` after this stream ends.
    pub fn chain(mut self, cont: Option<Proc<'a>>) -> Proc<'a> {
        if let Some(cont) = cont {
            self.pending.push_back(cont);
        }
        self
    }
}

fn pop_pending(mut pending: VecDeque<Proc<'_>>) -> Option<Proc<'_>> {
    let next = pending.pop_front()?;
    Some(next.before(pending))
}

/// A suspended consumer step.
pub struct Sink<'a>(Box<dyn FnOnce(Option<&Token>) -> SinkResult<'a> + 'a>);

impl<'a> Sink<'a> {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(Option<&Token>) -> SinkResult<'a> + 'a,
    {
        Sink(Box::new(f))
    }

    /// Deliver one token, or `None` for end-of-stream.
    pub fn feed(self, token: Option<&Token>) -> SinkResult<'a> {
        (self.0)(token)
    }

    /// A sink that appends every token to `out` until end-of-stream.
    pub fn collect(out: &'a mut Vec<Token>) -> Self {
        Sink::new(move |token| match token {
            Some(token) => {
                out.push(token.clone());
                Ok(Some(Sink::collect(out)))
            }
            None => Ok(None),
        })
    }

    /// A sink that consumes exactly one value, then continues with `cont`.
    ///
    /// Type names ahead of the value and tags inside it are consumed with
    /// it. A hash tag trailing the value is left for the sink `cont`
    /// returns.
    pub fn discard<F>(ctx: &Ctx, cont: F) -> Self
    where
        F: FnOnce() -> SinkResult<'a> + 'a,
    {
        discard_at(ctx.clone(), 0, Box::new(cont))
    }
}

fn discard_at<'a>(
    ctx: Ctx,
    depth: usize,
    cont: Box<dyn FnOnce() -> SinkResult<'a> + 'a>,
) -> Sink<'a> {
    Sink::new(move |token| {
        let Some(token) = token else {
            return Err(ctx.unmarshal_error(Reason::ExpectingValue));
        };
        let kind = token.kind();
        if kind.is_tag() || kind == Kind::TypeName {
            return Ok(Some(discard_at(ctx, depth, cont)));
        }
        if kind.is_begin() {
            return Ok(Some(discard_at(ctx, depth + 1, cont)));
        }
        if kind.is_end() {
            return match depth {
                0 => Err(ctx.unmarshal_error(Reason::UnexpectedEndToken)),
                1 => cont(),
                _ => Ok(Some(discard_at(ctx, depth - 1, cont))),
            };
        }
        if depth == 0 {
            cont()
        } else {
            Ok(Some(discard_at(ctx, depth, cont)))
        }
    })
}

/// Deliver one token to every live sink, dropping those that finish.
fn feed_all<'a>(sinks: Vec<Sink<'a>>, token: Option<&Token>) -> Result<Vec<Sink<'a>>> {
    let mut live = Vec::with_capacity(sinks.len());
    for sink in sinks {
        if let Some(next) = sink.feed(token)? {
            live.push(next);
        }
    }
    Ok(live)
}

/// Deliver end-of-stream until every sink has finished.
fn finish(mut sinks: Vec<Sink<'_>>) -> Result<()> {
    while !sinks.is_empty() {
        sinks = feed_all(sinks, None)?;
    }
    Ok(())
}

/// Pump `proc` into every sink.
///
/// Each round pulls one token (or end) and delivers it to every live sink.
/// Sinks that finish are dropped; the first error aborts the whole flow.
/// Returns once the stream is exhausted and no sinks remain.
pub fn copy(proc: Proc<'_>, sinks: Vec<Sink<'_>>) -> Result<()> {
    pump(proc, sinks).map_err(|e| {
        tracing::debug!(error = %e, "copy aborted");
        e
    })
}

fn pump(proc: Proc<'_>, mut sinks: Vec<Sink<'_>>) -> Result<()> {
    let mut proc = Some(proc);
    loop {
        let token = match proc.take() {
            Some(current) => {
                let (token, next) = current.step()?;
                proc = next;
                if token.is_none() && proc.is_some() {
                    continue;
                }
                token
            }
            None if sinks.is_empty() => return Ok(()),
            None => None,
        };
        sinks = feed_all(sinks, token.as_ref())?;
    }
}

/// Pass `proc` through unchanged while fanning every token out to `sinks`.
pub fn tee<'a>(proc: Proc<'a>, sinks: Vec<Sink<'a>>) -> Proc<'a> {
    Proc::new(move || {
        let (token, next) = proc.next_token()?;
        match token {
            Some(token) => {
                let sinks = feed_all(sinks, Some(&token))?;
                let next = next.unwrap_or_else(Proc::empty);
                let next = if sinks.is_empty() { next } else { tee(next, sinks) };
                Ok((Some(token), Some(next)))
            }
            None => {
                finish(sinks)?;
                Ok((None, None))
            }
        }
    })
}

/// Feed every token to all candidates; the first to finish wins.
///
/// Candidates that fail are dropped. When one candidate remains the sink
/// collapses to it. When all fail the last error is returned.
pub fn alt_sink<'a>(sinks: Vec<Sink<'a>>) -> Sink<'a> {
    Sink::new(move |token| {
        let mut live = Vec::with_capacity(sinks.len());
        let mut last_err = None;
        for sink in sinks {
            match sink.feed(token) {
                Ok(Some(next)) => live.push(next),
                Ok(None) => return Ok(None),
                Err(e) => last_err = Some(e),
            }
        }
        match (live.len(), last_err) {
            (0, Some(e)) => Err(e),
            (0, None) => Ok(None),
            (1, _) => Ok(live.pop()),
            _ => Ok(Some(alt_sink(live))),
        }
    })
}

/// Run each stream in order.
pub fn concat_procs(procs: Vec<Proc<'_>>) -> Proc<'_> {
    procs
        .into_iter()
        .rev()
        .fold(None, |cont, proc| Some(proc.chain(cont)))
        .unwrap_or_else(Proc::empty)
}

/// Feed each sink in order, advancing once the current one finishes.
pub fn concat_sinks(sinks: Vec<Sink<'_>>) -> Sink<'_> {
    concat_queue(sinks.into())
}

fn concat_queue(mut sinks: VecDeque<Sink<'_>>) -> Sink<'_> {
    Sink::new(move |token| {
        let Some(current) = sinks.pop_front() else {
            return Ok(None);
        };
        if let Some(next) = current.feed(token)? {
            sinks.push_front(next);
        }
        if sinks.is_empty() {
            Ok(None)
        } else {
            Ok(Some(concat_queue(sinks)))
        }
    })
}

type Predicate<'a> = Rc<dyn Fn(&Token) -> bool + 'a>;

/// Drop tokens for which `pred` is false.
pub fn filter_proc<'a, F>(proc: Proc<'a>, pred: F) -> Proc<'a>
where
    F: Fn(&Token) -> bool + 'a,
{
    filter_proc_rc(proc, Rc::new(pred))
}

fn filter_proc_rc<'a>(proc: Proc<'a>, pred: Predicate<'a>) -> Proc<'a> {
    Proc::new(move || {
        let (token, next) = proc.step()?;
        let token = token.filter(|t| pred(t));
        Ok((token, next.map(|next| filter_proc_rc(next, pred))))
    })
}

/// Withhold tokens for which `pred` is false from `sink`.
pub fn filter_sink<'a, F>(sink: Sink<'a>, pred: F) -> Sink<'a>
where
    F: Fn(&Token) -> bool + 'a,
{
    filter_sink_rc(sink, Rc::new(pred))
}

fn filter_sink_rc<'a>(sink: Sink<'a>, pred: Predicate<'a>) -> Sink<'a> {
    Sink::new(move |token| match token {
        Some(t) if !pred(t) => Ok(Some(filter_sink_rc(sink, pred))),
        _ => Ok(sink.feed(token)?.map(|next| filter_sink_rc(next, pred))),
    })
}

/// Strip out-of-band hash tags from a stream.
pub fn strip_tags(proc: Proc<'_>) -> Proc<'_> {
    filter_proc(proc, |t| !t.kind().is_tag())
}

/// Drain a stream into a buffer.
pub fn collect(proc: Proc<'_>) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut proc = Some(proc);
    while let Some(current) = proc {
        let (token, next) = current.step()?;
        tokens.extend(token);
        proc = next;
    }
    Ok(tokens)
}
