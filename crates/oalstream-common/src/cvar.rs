// cvar.rs: dynamic variable tracking

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct CvarFlags: u32 {
        /// Written out by `write_variables`.
        const ARCHIVE = 0x01;
        /// Only settable through `force_set`.
        const NOSET   = 0x02;
    }
}

/// A console variable.
#[derive(Clone, Debug)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub flags: CvarFlags,
    pub modified: bool,
    pub value: f32,
}

impl Cvar {
    fn assign(&mut self, value: &str) {
        self.string = value.to_string();
        self.value = value.parse::<f32>().unwrap_or(0.0);
        self.modified = true;
    }
}

/// The full cvar system context.
pub struct CvarContext {
    pub cvar_vars: Vec<Cvar>,
    /// name -> index in cvar_vars
    cvar_index: HashMap<String, usize>,
}

impl CvarContext {
    pub fn new() -> Self {
        Self {
            cvar_vars: Vec::new(),
            cvar_index: HashMap::new(),
        }
    }

    pub fn find_var(&self, name: &str) -> Option<&Cvar> {
        self.cvar_index.get(name).map(|&idx| &self.cvar_vars[idx])
    }

    pub fn find_var_mut(&mut self, name: &str) -> Option<&mut Cvar> {
        match self.cvar_index.get(name) {
            Some(&idx) => Some(&mut self.cvar_vars[idx]),
            None => None,
        }
    }

    /// Get the floating-point value of a cvar. Returns 0 if not found.
    pub fn variable_value(&self, name: &str) -> f32 {
        self.find_var(name).map_or(0.0, |var| var.value)
    }

    /// Get the string value of a cvar. Returns "" if not found.
    pub fn variable_string(&self, name: &str) -> &str {
        self.find_var(name).map_or("", |var| var.string.as_str())
    }

    /// Get or create a cvar. If it already exists, the value is not changed
    /// but flags are OR'd in.
    pub fn get(&mut self, name: &str, value: &str, flags: CvarFlags) -> &Cvar {
        if let Some(&idx) = self.cvar_index.get(name) {
            self.cvar_vars[idx].flags |= flags;
            return &self.cvar_vars[idx];
        }

        let idx = self.cvar_vars.len();
        self.cvar_vars.push(Cvar {
            name: name.to_string(),
            string: value.to_string(),
            flags,
            modified: true,
            value: value.parse::<f32>().unwrap_or(0.0),
        });
        self.cvar_index.insert(name.to_string(), idx);
        &self.cvar_vars[idx]
    }

    fn set2(&mut self, name: &str, value: &str, force: bool) {
        let Some(var) = self.find_var_mut(name) else {
            self.get(name, value, CvarFlags::empty());
            return;
        };

        if !force && var.flags.contains(CvarFlags::NOSET) {
            warn!("{} is write protected", name);
            return;
        }

        if var.string != value {
            var.assign(value);
        }
    }

    /// Set a cvar value (respects NOSET), creating it when missing.
    pub fn set(&mut self, name: &str, value: &str) {
        self.set2(name, value, false);
    }

    /// Force-set a cvar value (ignores NOSET).
    pub fn force_set(&mut self, name: &str, value: &str) {
        self.set2(name, value, true);
    }

    /// Set a cvar from a float value.
    pub fn set_value(&mut self, name: &str, value: f32) {
        let val_str = if value == (value as i32) as f32 {
            format!("{}", value as i32)
        } else {
            format!("{}", value)
        };
        self.set(name, &val_str);
    }

    /// Clear and return the modified flag of a cvar.
    pub fn take_modified(&mut self, name: &str) -> bool {
        self.find_var_mut(name)
            .map(|var| std::mem::take(&mut var.modified))
            .unwrap_or(false)
    }

    /// Execute config text: one `set <name> <value>` (or `<name> <value>`)
    /// per line. `//` and `#` start comments. Returns the number of
    /// variables assigned.
    pub fn exec_config(&mut self, text: &str) -> usize {
        let mut assigned = 0;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("//") || line.starts_with('#') {
                continue;
            }

            let tokens = tokenize(line);
            let args: Vec<&str> = tokens.iter().map(String::as_str).collect();
            match args.as_slice() {
                ["set", name, value] | [name, value] if *name != "set" => {
                    self.set(name, value);
                    assigned += 1;
                }
                _ => debug!("ignoring config line: {}", line),
            }
        }
        assigned
    }

    /// Write all archived cvars to a writer.
    pub fn write_variables(&self, writer: &mut dyn std::io::Write) -> std::io::Result<()> {
        for var in &self.cvar_vars {
            if var.flags.contains(CvarFlags::ARCHIVE) {
                writeln!(writer, "set {} \"{}\"", var.name, var.string)?;
            }
        }
        Ok(())
    }

    /// Log every cvar whose name starts with `prefix`.
    pub fn list(&self, prefix: &str) -> usize {
        let mut matching = 0;
        for var in self.cvar_vars.iter().filter(|v| v.name.starts_with(prefix)) {
            matching += 1;
            let archive = if var.flags.contains(CvarFlags::ARCHIVE) { '*' } else { ' ' };
            let noset = if var.flags.contains(CvarFlags::NOSET) { '-' } else { ' ' };
            info!("{}{} {} \"{}\"", archive, noset, var.name, var.string);
        }
        info!("{} cvars, {} matching", self.cvar_vars.len(), matching);
        matching
    }
}

impl Default for CvarContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a config line into whitespace separated tokens; double quotes group.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        tokens.push(current);
    }
    tokens
}

// ============================================================
// Global singleton and free-function wrappers
// ============================================================

static CVAR_CTX: Mutex<Option<CvarContext>> = parking_lot::const_mutex(None);

pub fn cvar_init() {
    *CVAR_CTX.lock() = Some(CvarContext::new());
}

pub fn cvar_shutdown() {
    *CVAR_CTX.lock() = None;
}

/// Run `f` against the global context. Returns `None` before `cvar_init`.
pub fn with_cvars<R>(f: impl FnOnce(&mut CvarContext) -> R) -> Option<R> {
    CVAR_CTX.lock().as_mut().map(f)
}

pub fn cvar_get(name: &str, value: &str, flags: CvarFlags) -> f32 {
    with_cvars(|c| c.get(name, value, flags).value).unwrap_or(0.0)
}

pub fn cvar_set(name: &str, value: &str) {
    with_cvars(|c| c.set(name, value));
}

pub fn cvar_variable_value(name: &str) -> f32 {
    with_cvars(|c| c.variable_value(name)).unwrap_or(0.0)
}

pub fn cvar_variable_string(name: &str) -> String {
    with_cvars(|c| c.variable_string(name).to_string()).unwrap_or_default()
}

pub fn cvar_exec(text: &str) -> usize {
    with_cvars(|c| c.exec_config(text)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_creates_with_default() {
        let mut ctx = CvarContext::new();
        let var = ctx.get("s_vbrate", "32000", CvarFlags::ARCHIVE);
        assert_eq!(var.value, 32000.0);
        assert_eq!(ctx.variable_string("s_vbrate"), "32000");
    }

    #[test]
    fn test_get_existing_keeps_value_and_ors_flags() {
        let mut ctx = CvarContext::new();
        ctx.get("s_streamvolume", "100", CvarFlags::empty());
        ctx.set("s_streamvolume", "80");
        let var = ctx.get("s_streamvolume", "127", CvarFlags::ARCHIVE);
        assert_eq!(var.value, 80.0);
        assert!(var.flags.contains(CvarFlags::ARCHIVE));
    }

    #[test]
    fn test_missing_variable_is_zero() {
        let ctx = CvarContext::new();
        assert_eq!(ctx.variable_value("nope"), 0.0);
        assert_eq!(ctx.variable_string("nope"), "");
    }

    #[test]
    fn test_noset_respected_unless_forced() {
        let mut ctx = CvarContext::new();
        ctx.get("version", "1", CvarFlags::NOSET);
        ctx.set("version", "2");
        assert_eq!(ctx.variable_value("version"), 1.0);
        ctx.force_set("version", "2");
        assert_eq!(ctx.variable_value("version"), 2.0);
    }

    #[test]
    fn test_set_value_formats_integers() {
        let mut ctx = CvarContext::new();
        ctx.set_value("a", 4.0);
        ctx.set_value("b", 0.5);
        assert_eq!(ctx.variable_string("a"), "4");
        assert_eq!(ctx.variable_string("b"), "0.5");
    }

    #[test]
    fn test_take_modified() {
        let mut ctx = CvarContext::new();
        ctx.get("x", "1", CvarFlags::empty());
        assert!(ctx.take_modified("x"));
        assert!(!ctx.take_modified("x"));
        ctx.set("x", "1");
        assert!(!ctx.take_modified("x"));
        ctx.set("x", "2");
        assert!(ctx.take_modified("x"));
    }

    #[test]
    fn test_exec_config() {
        let mut ctx = CvarContext::new();
        let text = "// stream setup\nset s_vbrate 22050\ns_streamvolume \"64\"\n# comment\nset broken\n";
        assert_eq!(ctx.exec_config(text), 2);
        assert_eq!(ctx.variable_value("s_vbrate"), 22050.0);
        assert_eq!(ctx.variable_value("s_streamvolume"), 64.0);
        assert!(ctx.find_var("broken").is_none());
    }

    #[test]
    fn test_tokenize_quotes() {
        assert_eq!(tokenize("set name \"two words\""), vec!["set", "name", "two words"]);
        assert_eq!(tokenize("set empty \"\""), vec!["set", "empty", ""]);
    }

    #[test]
    fn test_write_variables_only_archived() {
        let mut ctx = CvarContext::new();
        ctx.get("kept", "1", CvarFlags::ARCHIVE);
        ctx.get("dropped", "2", CvarFlags::empty());
        let mut out = Vec::new();
        ctx.write_variables(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "set kept \"1\"\n");
    }

    #[test]
    fn test_list_prefix() {
        let mut ctx = CvarContext::new();
        ctx.get("s_a", "1", CvarFlags::empty());
        ctx.get("s_b", "1", CvarFlags::empty());
        ctx.get("r_c", "1", CvarFlags::empty());
        assert_eq!(ctx.list("s_"), 2);
    }
}
