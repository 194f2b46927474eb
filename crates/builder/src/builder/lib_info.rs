//! Libraries built by one builder and linked into another.

use crate::config::Config;
use crate::hosts::Host;
use crate::process::{arg, check_call, Cmd};
use crate::session::Session;
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::PathBuf;

pub trait LibInfo {
    fn lib_name(&self) -> &'static str;

    /// Config the library was built for.
    fn lib_config(&self) -> &Config;

    fn lib_install_dir(&self, cx: &Session) -> PathBuf;

    fn lib_names(&self) -> Vec<&'static str> {
        vec![self.lib_name()]
    }

    fn static_lib(&self) -> bool {
        false
    }

    fn with_lib_version(&self) -> bool {
        true
    }

    fn include_dir(&self, cx: &Session) -> PathBuf {
        self.lib_install_dir(cx).join("include")
    }

    /// Version in the SONAME (Linux) or install name (Darwin) of the built library.
    fn lib_version(&self, cx: &Session) -> Result<String> {
        let os = self.lib_config().os();
        if os.is_windows() {
            bail!("Version shouldn't be needed for Windows");
        }
        let ext = if os.is_linux() { "so" } else { "dylib" };
        let lib = self
            .lib_install_dir(cx)
            .join("lib")
            .join(format!("{}.{ext}", self.lib_name()));
        if !lib.exists() {
            bail!("Lookup of version before library is built: {}", lib.display());
        }
        let output = Cmd::new([arg(cx.prebuilt_toolchain().objdump()), "-p".to_string(), arg(&lib)]).output()?;
        parse_lib_version(&output, self.lib_name(), os)
    }

    fn lib_suffix(&self, cx: &Session) -> Result<String> {
        let os = self.lib_config().os();
        if os.is_windows() && cx.win_sdk_enabled() {
            return Ok(".lib".to_string());
        }
        if self.static_lib() {
            return Ok(".a".to_string());
        }
        Ok(match os {
            Host::Linux if self.with_lib_version() => format!(".so.{}", self.lib_version(cx)?),
            Host::Linux => ".so".to_string(),
            Host::Darwin if self.with_lib_version() => format!(".{}.dylib", self.lib_version(cx)?),
            Host::Darwin => ".dylib".to_string(),
            Host::Windows => ".dll.a".to_string(),
            Host::Android | Host::Baremetal => bail!("No library suffix for {os}"),
        })
    }

    /// Libraries passed to the linker.
    fn link_libraries(&self, cx: &Session) -> Result<Vec<PathBuf>> {
        default_link_libraries(self, cx)
    }

    /// Libraries shipped next to the binaries that use them.
    fn install_libraries(&self, cx: &Session) -> Result<Vec<PathBuf>> {
        if self.static_lib() {
            return Ok(Vec::new());
        }
        if self.lib_config().os().is_windows() {
            let bin = self.lib_install_dir(cx).join("bin");
            return Ok(self
                .lib_names()
                .iter()
                .map(|name| bin.join(format!("{name}.dll")))
                .collect());
        }
        self.link_libraries(cx)
    }

    fn install_tools(&self, _cx: &Session) -> Vec<PathBuf> {
        Vec::new()
    }

    /// Unversioned links to the library that may need to be installed too.
    fn symlinks(&self, _cx: &Session) -> Vec<PathBuf> {
        Vec::new()
    }

    /// Rewrites Darwin install names to `@rpath` so users don't link an
    /// absolute path.
    fn update_lib_id(&self, cx: &Session) -> Result<()> {
        if self.static_lib() || !self.lib_config().os().is_darwin() {
            return Ok(());
        }
        let libs = self.link_libraries(cx)?;
        for lib in &libs {
            check_call([
                "install_name_tool".to_string(),
                "-id".to_string(),
                format!("@rpath/{}", file_name(lib)),
                arg(lib),
            ])?;
            for other in &libs {
                check_call([
                    "install_name_tool".to_string(),
                    "-change".to_string(),
                    arg(other),
                    format!("@rpath/{}", file_name(other)),
                    arg(lib),
                ])?;
            }
        }
        Ok(())
    }
}

/// `<install>/lib/<name><suffix>` for every library name.
pub fn default_link_libraries<L: LibInfo + ?Sized>(lib: &L, cx: &Session) -> Result<Vec<PathBuf>> {
    let suffix = lib.lib_suffix(cx)?;
    let lib_dir = lib.lib_install_dir(cx).join("lib");
    Ok(lib
        .lib_names()
        .iter()
        .map(|name| lib_dir.join(format!("{name}{suffix}")))
        .collect())
}

/// First link library, which is the one CMake find modules want.
pub fn primary_link_library(lib: &dyn LibInfo, cx: &Session) -> Result<PathBuf> {
    lib.link_libraries(cx)?
        .into_iter()
        .next()
        .with_context(|| format!("{} has no link libraries", lib.lib_name()))
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Extracts the library version from `llvm-objdump -p` output.
pub fn parse_lib_version(objdump_output: &str, name: &str, os: Host) -> Result<String> {
    let name = regex::escape(name);
    let pattern = if os.is_linux() {
        format!(r"SONAME\s*{name}\.so\.([0-9.]*)")
    } else {
        format!(r"name .*/{name}\.([0-9.]*)\.dylib \(offset")
    };
    let re = Regex::new(&pattern)?;
    re.captures(objdump_output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .with_context(|| format!("Cannot find regex pattern {pattern} in:\n{objdump_output}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::session_at;
    use std::path::Path;

    struct Fake {
        config: Config,
        static_lib: bool,
        versioned: bool,
    }

    impl LibInfo for Fake {
        fn lib_name(&self) -> &'static str {
            "libfoo"
        }
        fn lib_config(&self) -> &Config {
            &self.config
        }
        fn lib_install_dir(&self, _cx: &Session) -> PathBuf {
            PathBuf::from("/out/lib/libfoo-install")
        }
        fn lib_names(&self) -> Vec<&'static str> {
            vec!["libfoo", "libbar"]
        }
        fn static_lib(&self) -> bool {
            self.static_lib
        }
        fn with_lib_version(&self) -> bool {
            self.versioned
        }
    }

    #[test]
    fn test_parse_linux_soname() {
        let output = "Dynamic Section:\n  NEEDED       libc.so.6\n  SONAME       libxml2.so.2.10.3\n";
        assert_eq!(
            parse_lib_version(output, "libxml2", Host::Linux).unwrap(),
            "2.10.3"
        );
        assert!(parse_lib_version(output, "libedit", Host::Linux).is_err());
    }

    #[test]
    fn test_parse_darwin_install_name() {
        let output = "Load command 3\n          cmd LC_ID_DYLIB\n         name @rpath/libedit.0.dylib (offset 24)\n";
        assert_eq!(parse_lib_version(output, "libedit", Host::Darwin).unwrap(), "0");
    }

    #[test]
    fn test_suffixes_and_libraries() {
        let cx = session_at(Path::new("/android"));
        let windows = Fake {
            config: Config::mingw(false),
            static_lib: false,
            versioned: true,
        };
        assert_eq!(
            windows.link_libraries(&cx).unwrap(),
            vec![
                PathBuf::from("/out/lib/libfoo-install/lib/libfoo.dll.a"),
                PathBuf::from("/out/lib/libfoo-install/lib/libbar.dll.a"),
            ]
        );
        assert_eq!(
            windows.install_libraries(&cx).unwrap()[0],
            PathBuf::from("/out/lib/libfoo-install/bin/libfoo.dll")
        );

        let linux_static = Fake {
            config: Config::linux(false),
            static_lib: true,
            versioned: true,
        };
        assert_eq!(linux_static.lib_suffix(&cx).unwrap(), ".a");
        assert!(linux_static.install_libraries(&cx).unwrap().is_empty());

        let linux_unversioned = Fake {
            config: Config::linux(false),
            static_lib: false,
            versioned: false,
        };
        assert_eq!(linux_unversioned.lib_suffix(&cx).unwrap(), ".so");
        assert_eq!(
            linux_unversioned.include_dir(&cx),
            PathBuf::from("/out/lib/libfoo-install/include")
        );

        // Versioned lookups need the built library.
        let linux = Fake {
            config: Config::linux(false),
            static_lib: false,
            versioned: true,
        };
        assert!(linux.lib_suffix(&cx).is_err());
    }
}
