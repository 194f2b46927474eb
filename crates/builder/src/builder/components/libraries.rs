//! Host libraries linked into lldb and the LLVM tools, and swig.

use crate::builder::autoconf::{self, make_install, AutoconfBuilder};
use crate::builder::cmake::{self, define, lib_output_dir, suffixed, CMakeBuilder};
use crate::builder::lib_info::{default_link_libraries, primary_link_library, LibInfo};
use crate::builder::{base_ldflags, Builder};
use crate::config::{Config, Defines};
use crate::session::Session;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// `<out>/lib/<name><suffix>-install`, where every library builder installs.
fn lib_install_dir(cx: &Session, name: &str, c: &Config) -> PathBuf {
    suffixed(&lib_output_dir(cx, name, c), "-install")
}

pub struct LibNcurses {
    pub config: Config,
}

impl Builder for LibNcurses {
    fn name(&self) -> &'static str {
        "libncurses"
    }

    fn config_list(&self) -> Vec<Config> {
        vec![self.config.clone()]
    }

    fn cflags(&self, cx: &Session, c: &Config) -> Result<Vec<String>> {
        autoconf::cflags(cx, c)
    }

    fn cxxflags(&self, cx: &Session, c: &Config) -> Result<Vec<String>> {
        Ok(autoconf::cxxflags(self.cflags(cx, c)?))
    }

    fn build_config(&self, cx: &Session, c: &Config) -> Result<()> {
        autoconf::build_config(self, cx, c)
    }
}

impl AutoconfBuilder for LibNcurses {
    fn src_dir(&self, cx: &Session) -> PathBuf {
        cx.paths.libncurses_src_dir()
    }

    fn config_flags(&self, _cx: &Session, _c: &Config) -> Vec<String> {
        vec!["--with-shared".to_string()]
    }

    fn install_config(&self, cx: &Session, c: &Config) -> Result<()> {
        make_install(self, cx, c)?;
        self.update_lib_id(cx)
    }
}

impl LibInfo for LibNcurses {
    fn lib_name(&self) -> &'static str {
        "libncurses"
    }

    fn lib_config(&self) -> &Config {
        &self.config
    }

    fn lib_install_dir(&self, cx: &Session) -> PathBuf {
        lib_install_dir(cx, self.name(), &self.config)
    }

    fn lib_names(&self) -> Vec<&'static str> {
        vec!["libncurses", "libform", "libpanel"]
    }
}

pub struct LibEdit<'a> {
    pub config: Config,
    pub libncurses: &'a dyn LibInfo,
}

impl Builder for LibEdit<'_> {
    fn name(&self) -> &'static str {
        "libedit"
    }

    fn config_list(&self) -> Vec<Config> {
        vec![self.config.clone()]
    }

    fn cflags(&self, cx: &Session, c: &Config) -> Result<Vec<String>> {
        let include = self.libncurses.include_dir(cx);
        let mut cflags = vec![
            format!("-I{}", include.display()),
            format!("-I{}", include.join("ncurses").display()),
        ];
        cflags.extend(autoconf::cflags(cx, c)?);
        Ok(cflags)
    }

    fn cxxflags(&self, cx: &Session, c: &Config) -> Result<Vec<String>> {
        Ok(autoconf::cxxflags(self.cflags(cx, c)?))
    }

    fn ldflags(&self, cx: &Session, c: &Config) -> Result<Vec<String>> {
        let ncurses = primary_link_library(self.libncurses, cx)?;
        let ncurses_dir = ncurses.parent().unwrap_or(Path::new("."));
        let mut ldflags = vec![format!("-L{}", ncurses_dir.display())];
        ldflags.extend(base_ldflags(self.toolchain(cx), c));
        Ok(ldflags)
    }

    fn build_config(&self, cx: &Session, c: &Config) -> Result<()> {
        autoconf::build_config(self, cx, c)
    }
}

impl AutoconfBuilder for LibEdit<'_> {
    fn src_dir(&self, cx: &Session) -> PathBuf {
        cx.paths.libedit_src_dir()
    }

    fn install_config(&self, cx: &Session, c: &Config) -> Result<()> {
        make_install(self, cx, c)?;
        self.update_lib_id(cx)
    }
}

impl LibInfo for LibEdit<'_> {
    fn lib_name(&self) -> &'static str {
        "libedit"
    }

    fn lib_config(&self) -> &Config {
        &self.config
    }

    fn lib_install_dir(&self, cx: &Session) -> PathBuf {
        lib_install_dir(cx, self.name(), &self.config)
    }
}

/// Generates lldb's python bindings.
pub struct Swig {
    pub config: Config,
}

impl Swig {
    pub fn executable(&self, cx: &Session) -> PathBuf {
        lib_install_dir(cx, self.name(), &self.config).join("bin/swig")
    }
}

impl Builder for Swig {
    fn name(&self) -> &'static str {
        "swig"
    }

    fn config_list(&self) -> Vec<Config> {
        vec![self.config.clone()]
    }

    fn cflags(&self, cx: &Session, c: &Config) -> Result<Vec<String>> {
        autoconf::cflags(cx, c)
    }

    fn cxxflags(&self, cx: &Session, c: &Config) -> Result<Vec<String>> {
        Ok(autoconf::cxxflags(self.cflags(cx, c)?))
    }

    /// swig runs during the build and needs the toolchain's libc++.so.
    fn ldflags(&self, cx: &Session, c: &Config) -> Result<Vec<String>> {
        let toolchain = self.toolchain(cx);
        let mut ldflags = base_ldflags(toolchain, c);
        ldflags.extend(
            toolchain
                .lib_dirs()
                .iter()
                .map(|dir| format!("-Wl,-rpath,{}", dir.display())),
        );
        Ok(ldflags)
    }

    fn build_config(&self, cx: &Session, c: &Config) -> Result<()> {
        autoconf::build_config(self, cx, c)
    }
}

impl AutoconfBuilder for Swig {
    fn src_dir(&self, cx: &Session) -> PathBuf {
        cx.paths.swig_src_dir()
    }

    fn config_flags(&self, _cx: &Session, _c: &Config) -> Vec<String> {
        vec!["--without-pcre".to_string()]
    }
}

/// llvm-ranlib rejects the archive command CMake generates for Darwin, the
/// system one accepts it.
fn darwin_ranlib(defines: &mut Defines, c: &Config) {
    if c.os().is_darwin() {
        define(defines, "CMAKE_RANLIB", "/usr/bin/ranlib");
    }
}

pub struct Xz {
    pub config: Config,
}

impl Builder for Xz {
    fn name(&self) -> &'static str {
        "liblzma"
    }

    fn config_list(&self) -> Vec<Config> {
        vec![self.config.clone()]
    }

    fn build_config(&self, cx: &Session, c: &Config) -> Result<()> {
        cmake::build_config(self, cx, c)
    }
}

impl CMakeBuilder for Xz {
    fn src_dir(&self, cx: &Session) -> PathBuf {
        cx.paths.xz_src_dir()
    }

    fn cmake_defines(&self, cx: &Session, c: &Config) -> Result<Defines> {
        let mut defines = cmake::base_defines(self, cx, c)?;
        darwin_ranlib(&mut defines, c);
        Ok(defines)
    }
}

impl LibInfo for Xz {
    fn lib_name(&self) -> &'static str {
        "liblzma"
    }

    fn lib_config(&self) -> &Config {
        &self.config
    }

    fn lib_install_dir(&self, cx: &Session) -> PathBuf {
        lib_install_dir(cx, self.name(), &self.config)
    }

    fn static_lib(&self) -> bool {
        true
    }
}

pub struct Zstd {
    pub config: Config,
}

impl Builder for Zstd {
    fn name(&self) -> &'static str {
        "libzstd"
    }

    fn config_list(&self) -> Vec<Config> {
        vec![self.config.clone()]
    }

    fn build_config(&self, cx: &Session, c: &Config) -> Result<()> {
        cmake::build_config(self, cx, c)
    }
}

impl CMakeBuilder for Zstd {
    fn src_dir(&self, cx: &Session) -> PathBuf {
        cx.paths.zstd_src_dir().join("build/cmake")
    }

    fn cmake_defines(&self, cx: &Session, c: &Config) -> Result<Defines> {
        let mut defines = cmake::base_defines(self, cx, c)?;
        define(&mut defines, "ZSTD_BUILD_PROGRAMS", "OFF");
        darwin_ranlib(&mut defines, c);
        Ok(defines)
    }
}

impl LibInfo for Zstd {
    fn lib_name(&self) -> &'static str {
        "libzstd"
    }

    fn lib_config(&self) -> &Config {
        &self.config
    }

    fn lib_install_dir(&self, cx: &Session) -> PathBuf {
        lib_install_dir(cx, self.name(), &self.config)
    }

    fn with_lib_version(&self) -> bool {
        false
    }

    /// LLVM wants both the shared and the static library.
    fn link_libraries(&self, cx: &Session) -> Result<Vec<PathBuf>> {
        let install_dir = self.lib_install_dir(cx);
        let mut libs = if self.config.os().is_windows() {
            vec![install_dir.join("bin/libzstd.dll")]
        } else {
            default_link_libraries(self, cx)?
        };
        libs.push(install_dir.join("lib/libzstd.a"));
        Ok(libs)
    }
}

pub struct LibXml2 {
    pub config: Config,
}

/// Moves `file` to `<file>.bak` if it exists.
fn backup_file(file: &Path) -> Result<()> {
    if file.exists() {
        fs::rename(file, suffixed(file, ".bak"))
            .with_context(|| format!("Failed to back up {}", file.display()))?;
    }
    Ok(())
}

fn restore_file(file: &Path) -> Result<()> {
    let backup = suffixed(file, ".bak");
    if backup.exists() {
        fs::rename(&backup, file)
            .with_context(|| format!("Failed to restore {}", file.display()))?;
    }
    Ok(())
}

impl LibXml2 {
    /// The source tree carries platform-generated headers that must not be
    /// picked up. They stay in place for later platform builds.
    fn platform_headers(&self, cx: &Session) -> [PathBuf; 2] {
        let src_dir = self.src_dir(cx);
        [src_dir.join("include/libxml/xmlversion.h"), src_dir.join("config.h")]
    }
}

impl Builder for LibXml2 {
    fn name(&self) -> &'static str {
        "libxml2"
    }

    fn config_list(&self) -> Vec<Config> {
        vec![self.config.clone()]
    }

    fn ldflags(&self, cx: &Session, c: &Config) -> Result<Vec<String>> {
        let mut ldflags = base_ldflags(self.toolchain(cx), c);
        // Not every feature is built, so the version script names missing symbols.
        if c.os().is_linux() {
            ldflags.push("-Wl,--undefined-version".to_string());
        }
        Ok(ldflags)
    }

    fn build_config(&self, cx: &Session, c: &Config) -> Result<()> {
        let [xmlversion, config_h] = self.platform_headers(cx);
        backup_file(&xmlversion)?;
        let result = backup_file(&config_h).and_then(|()| cmake::build_config(self, cx, c));
        restore_file(&config_h)?;
        restore_file(&xmlversion)?;
        result
    }
}

impl CMakeBuilder for LibXml2 {
    fn src_dir(&self, cx: &Session) -> PathBuf {
        cx.paths.libxml2_src_dir()
    }

    fn cmake_defines(&self, cx: &Session, c: &Config) -> Result<Defines> {
        let mut defines = cmake::base_defines(self, cx, c)?;
        define(&mut defines, "LIBXML2_WITH_PYTHON", "OFF");
        define(&mut defines, "LIBXML2_WITH_PROGRAMS", "ON");
        define(&mut defines, "LIBXML2_WITH_LZMA", "OFF");
        define(&mut defines, "LIBXML2_WITH_ICONV", "OFF");
        define(&mut defines, "LIBXML2_WITH_ZLIB", "OFF");
        Ok(defines)
    }
}

impl LibInfo for LibXml2 {
    fn lib_name(&self) -> &'static str {
        "libxml2"
    }

    fn lib_config(&self) -> &Config {
        &self.config
    }

    fn lib_install_dir(&self, cx: &Session) -> PathBuf {
        lib_install_dir(cx, self.name(), &self.config)
    }

    fn include_dir(&self, cx: &Session) -> PathBuf {
        self.lib_install_dir(cx).join("include/libxml2")
    }

    fn symlinks(&self, cx: &Session) -> Vec<PathBuf> {
        let os = self.config.os();
        if os.is_windows() {
            return Vec::new();
        }
        let ext = if os.is_linux() { "so" } else { "dylib" };
        vec![self.lib_install_dir(cx).join(format!("lib/libxml2.{ext}"))]
    }

    fn install_tools(&self, cx: &Session) -> Vec<PathBuf> {
        vec![self.lib_install_dir(cx).join("bin/xmllint")]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::session_at;

    #[test]
    fn test_libedit_uses_ncurses() {
        let cx = session_at(Path::new("/android"));
        let libncurses = LibNcurses {
            config: Config::mingw(false),
        };
        let libedit = LibEdit {
            config: Config::mingw(false),
            libncurses: &libncurses,
        };
        let c = Config::mingw(false);
        let cflags = libedit.cflags(&cx, &c).unwrap();
        assert_eq!(
            cflags[..2],
            [
                "-I/android/out/lib/libncurses-windows-install/include".to_string(),
                "-I/android/out/lib/libncurses-windows-install/include/ncurses".to_string(),
            ]
        );
        assert_eq!(libedit.cxxflags(&cx, &c).unwrap().last().unwrap(), "-stdlib=libc++");
        assert_eq!(
            libedit.ldflags(&cx, &c).unwrap(),
            vec!["-L/android/out/lib/libncurses-windows-install/lib"]
        );
    }

    #[test]
    fn test_zstd_link_libraries() {
        let cx = session_at(Path::new("/android"));
        let zstd = Zstd {
            config: Config::mingw(false),
        };
        assert_eq!(
            zstd.link_libraries(&cx).unwrap(),
            vec![
                PathBuf::from("/android/out/lib/libzstd-windows-install/bin/libzstd.dll"),
                PathBuf::from("/android/out/lib/libzstd-windows-install/lib/libzstd.a"),
            ]
        );

        let linux = Zstd {
            config: Config::linux(false),
        };
        assert_eq!(
            linux.link_libraries(&cx).unwrap()[0],
            PathBuf::from("/android/out/lib/libzstd-linux-install/lib/libzstd.so")
        );
    }

    #[test]
    fn test_libxml2_layout() {
        let cx = session_at(Path::new("/android"));
        let libxml2 = LibXml2 {
            config: Config::linux(false),
        };
        assert_eq!(
            libxml2.include_dir(&cx),
            PathBuf::from("/android/out/lib/libxml2-linux-install/include/libxml2")
        );
        assert_eq!(
            libxml2.symlinks(&cx),
            vec![PathBuf::from("/android/out/lib/libxml2-linux-install/lib/libxml2.so")]
        );
        let windows = LibXml2 {
            config: Config::mingw(false),
        };
        assert!(windows.symlinks(&cx).is_empty());
    }

    #[test]
    fn test_backup_and_restore() {
        let dir = tempfile::tempdir().unwrap();
        let header = dir.path().join("config.h");
        fs::write(&header, "#define PLATFORM 1").unwrap();

        backup_file(&header).unwrap();
        assert!(!header.exists());
        assert!(dir.path().join("config.h.bak").exists());

        restore_file(&header).unwrap();
        assert_eq!(fs::read_to_string(&header).unwrap(), "#define PLATFORM 1");

        // Missing files are left alone.
        let missing = dir.path().join("xmlversion.h");
        backup_file(&missing).unwrap();
        restore_file(&missing).unwrap();
        assert!(!missing.exists());
    }

    #[test]
    fn test_swig_rpath() {
        let cx = session_at(Path::new("/android"));
        let swig = Swig {
            config: Config::linux(false),
        };
        let ldflags = swig.ldflags(&cx, &Config::linux(false)).unwrap();
        assert!(ldflags
            .iter()
            .any(|f| f.starts_with("-Wl,-rpath,/android/prebuilts/clang/host/linux-x86/")));
        assert_eq!(
            swig.executable(&cx),
            PathBuf::from("/android/out/lib/swig-linux-install/bin/swig")
        );
    }
}
