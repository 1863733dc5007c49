//! Core: wires the classifier, per-context ring buffers and per-output
//! writers together behind the single synchronous entry point the receiver
//! calls (spec §6, `submit`).

use std::collections::HashMap;

use crate::classifier;
use crate::config::{Config, GLOBAL};
use crate::ring_buffer::{Entry, RingBuffer};
use crate::writer::Writer;

pub struct Core {
    config: Config,
    writers: Vec<Writer>,
    ring_buffers: HashMap<String, RingBuffer>,
}

impl Core {
    pub fn new(config: Config) -> Self {
        let writers = config.outputs.iter().map(Writer::new).collect();
        let mut ring_buffers = HashMap::new();
        for ctx in &config.contexts {
            if let Some(rb) = &ctx.ring_buffer {
                ring_buffers.insert(ctx.name.clone(), RingBuffer::new(rb.size));
            }
        }
        Core {
            config,
            writers,
            ring_buffers,
        }
    }

    fn resolve_context(&self, context_name: &str) -> &str {
        if self.config.find_context(context_name).is_some() {
            context_name
        } else {
            GLOBAL
        }
    }

    /// Receiver -> Core entry point. Synchronous; called once per incoming
    /// message after the receiver has formatted the line.
    pub fn submit(&mut self, context_name: &str, facility: u8, level: u8, program: &str, line: &[u8]) {
        let ctx_name = self.resolve_context(context_name).to_string();

        let flush_level = self
            .config
            .find_context(&ctx_name)
            .and_then(|c| c.ring_buffer.as_ref())
            .map(|rb| rb.flush_level);

        if let Some(threshold) = flush_level {
            // Numerically greater = less severe than the threshold: enqueue
            // and return without writing.
            if level > threshold {
                if let Some(rb) = self.ring_buffers.get_mut(&ctx_name) {
                    rb.enqueue(Entry {
                        context: ctx_name.clone(),
                        facility,
                        level,
                        program: program.to_string(),
                        line: line.to_vec(),
                    });
                }
                return;
            }
            // At or more severe: drain predecessors (in arrival order)
            // before writing the triggering message.
            self.drain_context(&ctx_name);
        }

        route(&self.config, &mut self.writers, &ctx_name, facility, level, program, line);
    }

    fn drain_context(&mut self, ctx_name: &str) {
        let drained = self
            .ring_buffers
            .get_mut(ctx_name)
            .map(|rb| rb.drain())
            .unwrap_or_default();
        for entry in drained {
            route(
                &self.config,
                &mut self.writers,
                &entry.context,
                entry.facility,
                entry.level,
                &entry.program,
                &entry.line,
            );
        }
    }

    /// Shutdown drain (spec §5): treat shutdown as a synthetic trigger at
    /// the most severe level for every context with a ring buffer, then
    /// close every output's file handle.
    pub fn shutdown(&mut self) {
        let contexts: Vec<String> = self.ring_buffers.keys().cloned().collect();
        for ctx_name in contexts {
            self.drain_context(&ctx_name);
        }
        for writer in self.writers.iter_mut() {
            writer.close();
        }
    }
}

fn route(
    config: &Config,
    writers: &mut [Writer],
    context_name: &str,
    facility: u8,
    level: u8,
    program: &str,
    line: &[u8],
) {
    let targets = classifier::classify(config, context_name, facility, level, program);
    for idx in targets {
        if let Some(writer) = writers.get_mut(idx) {
            writer.write_line(line);
        }
    }
}
