//! Subprocess helpers.
//!
//! Every external tool the build drives goes through [`Cmd`], which logs the
//! command line before running it and turns a non-zero exit into an error.

use crate::config::Env;
use anyhow::{bail, Context, Result};
use chrono::Local;
use log::debug;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

/// A command line with optional working directory and environment.
///
/// When an environment is given it replaces the inherited one entirely.
#[derive(Debug, Clone)]
pub struct Cmd {
    args: Vec<String>,
    cwd: Option<PathBuf>,
    env: Option<Env>,
}

impl Cmd {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            env: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, env: Env) -> Self {
        self.env = Some(env);
        self
    }

    pub fn argv(&self) -> &[String] {
        &self.args
    }

    fn program(&self) -> &str {
        self.args.first().map_or("", String::as_str)
    }

    fn command(&self) -> Result<Command> {
        let Some((program, rest)) = self.args.split_first() else {
            bail!("empty command line");
        };
        debug!(
            "subprocess.run:{} {}",
            Local::now().format("%H:%M:%S"),
            list2cmdline(&self.args)
        );
        let mut cmd = Command::new(program);
        cmd.args(rest);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        if let Some(env) = &self.env {
            cmd.env_clear().envs(env);
        }
        Ok(cmd)
    }

    /// Runs the command and returns its exit status without checking it.
    pub fn status(&self) -> Result<ExitStatus> {
        self.command()?
            .status()
            .with_context(|| format!("Failed to run {}", self.program()))
    }

    /// Runs the command; a non-zero exit is an error.
    pub fn run(&self) -> Result<()> {
        let status = self.status()?;
        if !status.success() {
            bail!("{} failed with {status}", self.program());
        }
        Ok(())
    }

    /// Runs the command and captures stdout.
    pub fn output(&self) -> Result<String> {
        let output = self
            .command()?
            .stderr(Stdio::inherit())
            .output()
            .with_context(|| format!("Failed to run {}", self.program()))?;
        if !output.status.success() {
            bail!("{} failed with {}", self.program(), output.status);
        }
        String::from_utf8(output.stdout)
            .with_context(|| format!("{} output contains invalid UTF-8", self.program()))
    }
}

/// Shorthand for `Cmd::new(args).run()`.
pub fn check_call<I, S>(args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Cmd::new(args).run()
}

pub fn check_output<I, S>(args: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Cmd::new(args).output()
}

/// Path argument as a string.
pub fn arg(path: impl AsRef<OsStr>) -> String {
    Path::new(path.as_ref()).display().to_string()
}

fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "@%+=:,./_-".contains(c)
}

/// Quotes one word for a Bourne shell.
pub fn shell_quote(word: &str) -> String {
    if word.is_empty() {
        return "''".to_string();
    }
    if word.chars().all(is_safe_char) {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', r#"'"'"'"#))
}

/// Joins arguments into a Bourne shell command line.
pub fn list2cmdline(args: &[String]) -> String {
    args.iter()
        .map(|a| shell_quote(a))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Writes a shell script that replays `cmd` with the variables of `env`
/// that differ from `orig_env`.
pub fn create_script(script_path: &Path, cmd: &[String], env: &Env, orig_env: &Env) -> Result<()> {
    let mut script = String::from("#!/bin/sh\n");
    for (key, value) in env {
        if orig_env.get(key) != Some(value) {
            script.push_str(&format!("export {key}=\"{value}\"\n"));
        }
    }
    script.push_str(&list2cmdline(cmd));
    script.push_str(" $@\n");

    fs::write(script_path, script)
        .with_context(|| format!("Failed to write {}", script_path.display()))?;
    crate::fs_util::set_executable(script_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_list2cmdline() {
        assert_eq!(
            list2cmdline(&strings(&["cmake", "-DCMAKE_C_FLAGS=-O2 -g", "", "it's"])),
            r#"cmake '-DCMAKE_C_FLAGS=-O2 -g' '' 'it'"'"'s'"#
        );
        assert_eq!(
            list2cmdline(&strings(&["ninja", "-C", "/out/stage1", "check-clang"])),
            "ninja -C /out/stage1 check-clang"
        );
    }

    #[test]
    fn test_create_script() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("cmake_invocation.sh");
        let orig: Env = [("HOME".to_string(), "/home/u".to_string())].into();
        let env: Env = [
            ("HOME".to_string(), "/home/u".to_string()),
            ("PATH".to_string(), "/tc/bin:/usr/bin".to_string()),
        ]
        .into();

        create_script(&script, &strings(&["cmake", "-G", "Ninja", "/src"]), &env, &orig).unwrap();

        assert_eq!(
            fs::read_to_string(&script).unwrap(),
            "#!/bin/sh\nexport PATH=\"/tc/bin:/usr/bin\"\ncmake -G Ninja /src $@\n"
        );
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&script).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_run_and_output() {
        assert!(check_call(["true"]).is_ok());
        assert!(check_call(["false"]).is_err());
        assert_eq!(check_output(["echo", "hello"]).unwrap(), "hello\n");
        let dir = tempfile::tempdir().unwrap();
        let out = Cmd::new(["pwd"]).cwd(dir.path()).output().unwrap();
        assert_eq!(
            fs::canonicalize(out.trim()).unwrap(),
            fs::canonicalize(dir.path()).unwrap()
        );
        assert!(Cmd::new(Vec::<String>::new()).run().is_err());
    }
}
