// cvar.rs — dynamic variable tracking

use crate::common::com_printf;
use crate::q_shared::{CVAR_LATCH, CVAR_NOSET};

use std::collections::HashMap;

/// A console variable.
#[derive(Debug, Clone)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub latched_string: Option<String>,
    pub flags: i32,
    pub modified: bool,
    pub value: f32,
}

/// The full cvar system context.
#[derive(Debug, Default)]
pub struct CvarContext {
    pub cvar_vars: Vec<Cvar>,
    /// O(1) cvar lookup by name -> index in cvar_vars
    cvar_index: HashMap<String, usize>,
}

impl CvarContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a cvar by name, returning its index. O(1) via HashMap.
    pub fn find_var_index(&self, name: &str) -> Option<usize> {
        self.cvar_index.get(name).copied()
    }

    /// Find a cvar by name. O(1) via HashMap.
    pub fn find_var(&self, name: &str) -> Option<&Cvar> {
        self.cvar_index.get(name).map(|&idx| &self.cvar_vars[idx])
    }

    /// Get the floating-point value of a cvar. Returns 0 if not found.
    pub fn variable_value(&self, name: &str) -> f32 {
        match self.find_var(name) {
            Some(var) => var.value,
            None => 0.0,
        }
    }

    /// Get the string value of a cvar. Returns "" if not found.
    pub fn variable_string(&self, name: &str) -> &str {
        match self.find_var(name) {
            Some(var) => &var.string,
            None => "",
        }
    }

    /// Get or create a cvar. If it already exists, the value is not changed
    /// but flags are OR'd in.
    pub fn get(&mut self, name: &str, value: &str, flags: i32) -> usize {
        if let Some(&idx) = self.cvar_index.get(name) {
            self.cvar_vars[idx].flags |= flags;
            return idx;
        }

        let idx = self.cvar_vars.len();
        self.cvar_vars.push(Cvar {
            name: name.to_string(),
            string: value.to_string(),
            latched_string: None,
            flags,
            modified: true,
            value: value.parse::<f32>().unwrap_or(0.0),
        });
        self.cvar_index.insert(name.to_string(), idx);
        idx
    }

    /// Internal set implementation.
    fn set2(&mut self, name: &str, value: &str, force: bool) -> usize {
        let idx = match self.find_var_index(name) {
            Some(idx) => idx,
            None => return self.get(name, value, 0),
        };

        if !force {
            if self.cvar_vars[idx].flags & CVAR_NOSET != 0 {
                com_printf(&format!("{} is write protected.\n", name));
                return idx;
            }

            if self.cvar_vars[idx].flags & CVAR_LATCH != 0 {
                let unchanged = match self.cvar_vars[idx].latched_string {
                    Some(ref latched) => value == latched,
                    None => value == self.cvar_vars[idx].string,
                };
                if !unchanged {
                    com_printf(&format!("{} will be changed for next level.\n", name));
                    self.cvar_vars[idx].latched_string = Some(value.to_string());
                }
                return idx;
            }
        } else {
            self.cvar_vars[idx].latched_string = None;
        }

        if value == self.cvar_vars[idx].string {
            return idx; // not changed
        }

        let var = &mut self.cvar_vars[idx];
        var.modified = true;
        var.string = value.to_string();
        var.value = value.parse::<f32>().unwrap_or(0.0);
        idx
    }

    /// Set a cvar value (respects NOSET and LATCH flags).
    pub fn set(&mut self, name: &str, value: &str) -> usize {
        self.set2(name, value, false)
    }

    /// Force-set a cvar value (ignores NOSET and LATCH).
    pub fn force_set(&mut self, name: &str, value: &str) -> usize {
        self.set2(name, value, true)
    }

    /// Apply all latched variable changes. Called between level loads.
    pub fn get_latched_vars(&mut self) {
        for var in &mut self.cvar_vars {
            if let Some(latched) = var.latched_string.take() {
                var.value = latched.parse::<f32>().unwrap_or(0.0);
                var.string = latched;
                var.modified = true;
            }
        }
    }

    /// Apply `+set name value` triples from the command line, the way the
    /// engine runs its early commands before anything else initializes.
    /// Returns the remaining arguments in order.
    pub fn add_early_commands(&mut self, args: &[String]) -> Vec<String> {
        let mut rest = Vec::new();
        let mut i = 0;
        while i < args.len() {
            if args[i] != "+set" {
                rest.push(args[i].clone());
                i += 1;
                continue;
            }
            match (args.get(i + 1), args.get(i + 2)) {
                (Some(name), Some(value)) => {
                    self.force_set(name, value);
                }
                _ => com_printf("usage: +set <variable> <value>\n"),
            }
            i += 3;
        }
        rest
    }
}
