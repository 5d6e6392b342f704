//! Shortcut target resolution.
//!
//! A shortcut is resolved by trying each [`ShortcutStrategy`] in order until
//! one yields a target. The default chain asks the platform first (symbolic
//! links, `.url` and `.desktop` entries) and then falls back to parsing the
//! binary Shell Link format used by `.lnk` files. A shortcut nobody can read
//! resolves to an empty target; resolution never fails the caller.

use std::fs;
use std::path::Path;
use tracing::debug;

/// Extensions (lower-case, dotted) of files treated as shortcuts.
pub const SHORTCUT_EXTENSIONS: &[&str] = &[".lnk", ".url", ".desktop"];

/// Returns true if a dotted, lower-case extension denotes a shortcut file.
pub fn is_shortcut_extension(ext: &str) -> bool {
    SHORTCUT_EXTENSIONS.contains(&ext)
}

/// One way of reading the target stored in a shortcut.
pub trait ShortcutStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns the stored target, or `None` if this strategy cannot read it.
    fn resolve(&self, path: &Path) -> Option<String>;
}

/// Target of a shortcut; empty when resolution failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortcutTarget(String);

impl ShortcutTarget {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Ordered chain of resolution strategies.
pub struct ShortcutResolver {
    strategies: Vec<Box<dyn ShortcutStrategy>>,
}

impl ShortcutResolver {
    pub fn new(strategies: Vec<Box<dyn ShortcutStrategy>>) -> Self {
        Self { strategies }
    }

    /// Tries every strategy in order and returns the first non-empty target.
    pub fn resolve(&self, path: &Path) -> ShortcutTarget {
        for strategy in &self.strategies {
            if let Some(target) = strategy.resolve(path) {
                let target = target.trim();
                if !target.is_empty() {
                    debug!(
                        path = %path.display(),
                        strategy = strategy.name(),
                        target,
                        "resolved shortcut"
                    );
                    return ShortcutTarget(target.to_string());
                }
            }
        }
        ShortcutTarget::default()
    }
}

impl Default for ShortcutResolver {
    fn default() -> Self {
        Self::new(vec![Box::new(PlatformLinkReader), Box::new(ShellLinkParser)])
    }
}

/// Text fed to the keyword scorer for a shortcut: the name, then the target.
///
/// ```
/// use desktop_organizer::shortcut::keyword_text;
///
/// assert_eq!(keyword_text("steam", "C:\\Games\\steam.exe"), "steam C:\\Games\\steam.exe");
/// assert_eq!(keyword_text("steam", ""), "steam");
/// ```
pub fn keyword_text(name: &str, target: &str) -> String {
    if target.is_empty() {
        name.to_string()
    } else {
        format!("{} {}", name, target)
    }
}

/// Resolves symbolic links and INI-style link files.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformLinkReader;

impl ShortcutStrategy for PlatformLinkReader {
    fn name(&self) -> &'static str {
        "platform"
    }

    fn resolve(&self, path: &Path) -> Option<String> {
        let meta = fs::symlink_metadata(path).ok()?;
        if meta.file_type().is_symlink() {
            return fs::read_link(path)
                .ok()
                .map(|t| t.to_string_lossy().into_owned());
        }

        let ext = crate::rules::extension_of(&path.file_name()?.to_string_lossy());
        let keys: &[&str] = match ext.as_str() {
            ".url" => &["URL"],
            ".desktop" => &["Exec", "URL", "Path"],
            _ => return None,
        };
        let content = fs::read_to_string(path).ok()?;
        ini_value(&content, keys)
    }
}

/// First value found for any of `keys`, in key priority order.
fn ini_value(content: &str, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        content.lines().find_map(|line| {
            let (k, v) = line.trim().split_once('=')?;
            (k.trim() == *key && !v.trim().is_empty()).then(|| v.trim().to_string())
        })
    })
}

/// Reads the target out of a binary Shell Link (`.lnk`) file.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellLinkParser;

impl ShortcutStrategy for ShellLinkParser {
    fn name(&self) -> &'static str {
        "shell-link"
    }

    fn resolve(&self, path: &Path) -> Option<String> {
        let data = fs::read(path).ok()?;
        parse_shell_link(&data)
    }
}

const HEADER_SIZE: u32 = 0x4C;
const LINK_CLSID: [u8; 16] = [
    0x01, 0x14, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46,
];

const HAS_LINK_TARGET_ID_LIST: u32 = 0x01;
const HAS_LINK_INFO: u32 = 0x02;
const HAS_NAME: u32 = 0x04;
const HAS_RELATIVE_PATH: u32 = 0x08;
const HAS_WORKING_DIR: u32 = 0x10;
const IS_UNICODE: u32 = 0x80;

const VOLUME_ID_AND_LOCAL_BASE_PATH: u32 = 0x01;

/// Extracts the target path from Shell Link bytes.
///
/// Prefers the LinkInfo local base path joined with its common path suffix.
/// Without one, falls back to the relative path and then the working
/// directory from the string data section.
pub fn parse_shell_link(data: &[u8]) -> Option<String> {
    if read_u32(data, 0)? != HEADER_SIZE || data.get(4..20)? != LINK_CLSID {
        return None;
    }
    let flags = read_u32(data, 20)?;
    let mut offset = HEADER_SIZE as usize;

    if flags & HAS_LINK_TARGET_ID_LIST != 0 {
        let id_list_size = read_u16(data, offset)? as usize;
        offset = offset.checked_add(2 + id_list_size)?;
    }

    if flags & HAS_LINK_INFO != 0 {
        let info_size = read_u32(data, offset)? as usize;
        let info = data.get(offset..offset.checked_add(info_size)?)?;
        if let Some(target) = link_info_path(info) {
            return Some(target);
        }
        offset += info_size;
    }

    let unicode = flags & IS_UNICODE != 0;
    let mut relative_path = None;
    let mut working_dir = None;
    for (flag, slot) in [
        (HAS_NAME, None),
        (HAS_RELATIVE_PATH, Some(&mut relative_path)),
        (HAS_WORKING_DIR, Some(&mut working_dir)),
    ] {
        if flags & flag == 0 {
            continue;
        }
        let (value, next) = string_data(data, offset, unicode)?;
        offset = next;
        if let Some(slot) = slot {
            *slot = Some(value);
        }
    }

    relative_path
        .or(working_dir)
        .filter(|s: &String| !s.is_empty())
}

fn link_info_path(info: &[u8]) -> Option<String> {
    let header_size = read_u32(info, 4)?;
    let info_flags = read_u32(info, 8)?;
    if info_flags & VOLUME_ID_AND_LOCAL_BASE_PATH == 0 {
        return None;
    }

    if header_size >= 0x24 {
        let base_offset = read_u32(info, 28)? as usize;
        let suffix_offset = read_u32(info, 32)? as usize;
        if base_offset != 0
            && let Some(base) = utf16_c_string(info, base_offset)
        {
            let suffix = if suffix_offset != 0 {
                utf16_c_string(info, suffix_offset).unwrap_or_default()
            } else {
                String::new()
            };
            return Some(join_link_path(&base, &suffix));
        }
    }

    let base = ansi_c_string(info, read_u32(info, 16)? as usize)?;
    let suffix = ansi_c_string(info, read_u32(info, 24)? as usize).unwrap_or_default();
    Some(join_link_path(&base, &suffix)).filter(|s| !s.is_empty())
}

fn join_link_path(base: &str, suffix: &str) -> String {
    if suffix.is_empty() || base.ends_with('\\') {
        format!("{}{}", base, suffix)
    } else {
        format!("{}\\{}", base, suffix)
    }
}

fn string_data(data: &[u8], offset: usize, unicode: bool) -> Option<(String, usize)> {
    let count = read_u16(data, offset)? as usize;
    let start = offset + 2;
    if unicode {
        let end = start.checked_add(count * 2)?;
        let units: Vec<u16> = data
            .get(start..end)?
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        Some((String::from_utf16_lossy(&units), end))
    } else {
        let end = start.checked_add(count)?;
        let bytes = data.get(start..end)?;
        Some((String::from_utf8_lossy(bytes).into_owned(), end))
    }
}

fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn ansi_c_string(data: &[u8], offset: usize) -> Option<String> {
    let rest = data.get(offset..)?;
    let end = rest.iter().position(|&b| b == 0)?;
    Some(String::from_utf8_lossy(&rest[..end]).into_owned())
}

fn utf16_c_string(data: &[u8], offset: usize) -> Option<String> {
    let rest = data.get(offset..)?;
    let units: Vec<u16> = rest
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|&u| u != 0)
        .collect();
    Some(String::from_utf16_lossy(&units))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn header(flags: u32) -> Vec<u8> {
        let mut data = vec![0u8; HEADER_SIZE as usize];
        data[0..4].copy_from_slice(&HEADER_SIZE.to_le_bytes());
        data[4..20].copy_from_slice(&LINK_CLSID);
        data[20..24].copy_from_slice(&flags.to_le_bytes());
        data
    }

    /// LinkInfo block with an ANSI local base path and an empty suffix.
    fn link_info(base: &str) -> Vec<u8> {
        let header_len = 0x1C_u32;
        let base_offset = header_len;
        let suffix_offset = base_offset + base.len() as u32 + 1;
        let total = suffix_offset + 1;

        let mut info = Vec::new();
        info.extend_from_slice(&total.to_le_bytes());
        info.extend_from_slice(&header_len.to_le_bytes());
        info.extend_from_slice(&VOLUME_ID_AND_LOCAL_BASE_PATH.to_le_bytes());
        info.extend_from_slice(&0u32.to_le_bytes()); // VolumeIDOffset
        info.extend_from_slice(&base_offset.to_le_bytes());
        info.extend_from_slice(&0u32.to_le_bytes()); // CommonNetworkRelativeLinkOffset
        info.extend_from_slice(&suffix_offset.to_le_bytes());
        info.extend_from_slice(base.as_bytes());
        info.push(0);
        info.push(0);
        info
    }

    fn unicode_string(value: &str) -> Vec<u8> {
        let units: Vec<u16> = value.encode_utf16().collect();
        let mut out = (units.len() as u16).to_le_bytes().to_vec();
        for u in units {
            out.extend_from_slice(&u.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_parse_link_info_local_path() {
        let mut data = header(HAS_LINK_INFO);
        data.extend(link_info("C:\\Games\\Steam\\steam.exe"));

        assert_eq!(
            parse_shell_link(&data).as_deref(),
            Some("C:\\Games\\Steam\\steam.exe")
        );
    }

    #[test]
    fn test_parse_skips_id_list() {
        let mut data = header(HAS_LINK_TARGET_ID_LIST | HAS_LINK_INFO);
        data.extend_from_slice(&4u16.to_le_bytes());
        data.extend_from_slice(&[0xAA, 0xBB, 0x00, 0x00]);
        data.extend(link_info("D:\\Music\\player.exe"));

        assert_eq!(
            parse_shell_link(&data).as_deref(),
            Some("D:\\Music\\player.exe")
        );
    }

    #[test]
    fn test_parse_relative_path_from_string_data() {
        let mut data = header(HAS_NAME | HAS_RELATIVE_PATH | IS_UNICODE);
        data.extend(unicode_string("My Game"));
        data.extend(unicode_string("..\\Games\\launcher.exe"));

        assert_eq!(
            parse_shell_link(&data).as_deref(),
            Some("..\\Games\\launcher.exe")
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_shell_link(b"not a shortcut at all"), None);
        assert_eq!(parse_shell_link(&[]), None);

        let mut truncated = header(HAS_LINK_INFO);
        truncated.extend_from_slice(&200u32.to_le_bytes());
        assert_eq!(parse_shell_link(&truncated), None);
    }

    #[test]
    fn test_ini_style_shortcuts() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let url = temp_dir.path().join("Docs.url");
        fs::write(&url, "[InternetShortcut]\nURL=https://example.com/manual\n").unwrap();
        let desktop = temp_dir.path().join("editor.desktop");
        fs::write(
            &desktop,
            "[Desktop Entry]\nName=Editor\nExec=/usr/bin/code --new-window\n",
        )
        .unwrap();

        let resolver = ShortcutResolver::default();
        assert_eq!(resolver.resolve(&url).as_str(), "https://example.com/manual");
        assert_eq!(
            resolver.resolve(&desktop).as_str(),
            "/usr/bin/code --new-window"
        );
    }

    #[test]
    fn test_resolver_falls_back_to_binary_parser() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let lnk = temp_dir.path().join("Steam.lnk");
        let mut data = header(HAS_LINK_INFO);
        data.extend(link_info("C:\\Games\\steam.exe"));
        fs::write(&lnk, data).unwrap();

        let target = ShortcutResolver::default().resolve(&lnk);
        assert_eq!(target.as_str(), "C:\\Games\\steam.exe");
    }

    #[test]
    fn test_unreadable_shortcut_resolves_empty() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let lnk = temp_dir.path().join("broken.lnk");
        fs::write(&lnk, b"garbage").unwrap();

        let resolver = ShortcutResolver::default();
        assert!(resolver.resolve(&lnk).is_empty());
        assert!(resolver.resolve(&temp_dir.path().join("missing.lnk")).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_target() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let target = temp_dir.path().join("music_player");
        fs::write(&target, "bin").unwrap();
        let link = temp_dir.path().join("player");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let resolved = ShortcutResolver::default().resolve(&link);
        assert_eq!(resolved.as_str(), target.to_string_lossy());
    }

    #[test]
    fn test_shortcut_extensions() {
        assert!(is_shortcut_extension(".lnk"));
        assert!(is_shortcut_extension(".desktop"));
        assert!(!is_shortcut_extension(".exe"));
    }
}
