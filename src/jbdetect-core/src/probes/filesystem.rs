//! Jailbreak artifact presence.
//!
//! Package managers, alternate app stores, rootless bootstrap layouts and
//! exploit leftovers all leave files that never exist on a stock device.
//! Existence is decided with `symlink_metadata`, so a dangling link still
//! counts as present. Paths are checked in a random order on each run.
//!
//! Control paths work the other way round: they exist on every stock
//! device, so reporting one of them as missing means a file-hiding hook
//! is answering lookups.

use std::io;
use std::path::Path;

use rand::seq::SliceRandom;
use tracing::debug;

use crate::config::DetectConfig;
use crate::probe::{Probe, Weight};
use crate::types::ProbeResult;

/// Probe label.
pub const LABEL: &str = "filesystem";

/// Jailbreak-only paths on iOS.
///
/// Paths that also exist on stock devices (`/etc/ssl/certs`,
/// `/etc/ssl/cert.pem`, `/usr/lib/libz.dylib`, `/private/var/log/syslog`)
/// are excluded.
#[cfg_attr(not(any(test, target_os = "ios")), allow(dead_code))]
const IOS_PATHS: &[&str] = &[
    // Rootless bootstrap
    "/var/jb",
    "/var/jb/Applications",
    "/var/jb/usr/bin",
    "/var/jb/private/etc",
    "/var/jb/Applications/Sileo.app",
    "/var/jb/Applications/Filza.app",
    "/private/var/containers/Bundle/Application/.jb",
    // Package managers and stores
    "/Applications/Cydia.app",
    "/Applications/Sileo.app",
    "/Applications/Zebra.app",
    "/Applications/Filza.app",
    "/Applications/Flex.app",
    "/Applications/Aemulo.app",
    "/Applications/iCleaner.app",
    "/Applications/blackra1n.app",
    "/Applications/FakeCarrier.app",
    "/Applications/Icy.app",
    "/Applications/IntelliScreen.app",
    "/Applications/MxTube.app",
    "/Applications/RockApp.app",
    "/Applications/SBSettings.app",
    "/Applications/WinterBoard.app",
    "/etc/apt",
    "/etc/apt/sources.list.d/sileo.sources",
    "/etc/apt/sources.list.d/electra.list",
    "/etc/apt/undecimus/undecimus.list",
    "/private/var/lib/apt",
    "/private/var/cache/apt",
    "/private/var/lib/cydia",
    "/private/var/tmp/cydia.log",
    "/private/var/lib/dpkg",
    "/var/lib/cydia",
    "/var/lib/dpkg/info/mobilesubstrate.md5sums",
    "/var/log/apt",
    "/usr/libexec/cydia/firmware.sh",
    "/private/var/mobile/Library/HTTPStorages/org.coolstar.SileoStore",
    "/private/var/mobile/Library/HTTPStorages/com.opa334.Dopamine",
    // Tweak injection
    "/Library/MobileSubstrate/MobileSubstrate.dylib",
    "/Library/MobileSubstrate/CydiaSubstrate.dylib",
    "/Library/MobileSubstrate/DynamicLibraries",
    "/Library/TweakInject",
    "/usr/share/jailbreak/injectme.plist",
    "/usr/lib/libjailbreak.dylib",
    "/System/Library/LaunchDaemons/com.ikey.bbot.plist",
    "/System/Library/LaunchDaemons/com.saurik.Cydia.Startup.plist",
    "/private/var/mobile/Library/SBSettings/Themes",
    // Exploit artifacts
    "/.cydia_no_stash",
    "/.installed_unc0ver",
    "/.bootstrapped_electra",
    "/jb/amfid_payload.dylib",
    "/jb/libjailbreak.dylib",
    "/jb/jailbreakd.plist",
    "/jb/offsets.plist",
    "/jb/lzma",
    "/private/var/stash",
    "/private/var/db/stash",
    // Shell and remote access
    "/bin/bash",
    "/bin/sh",
    "/usr/sbin/sshd",
    "/usr/bin/sshd",
    "/usr/bin/ssh",
    "/usr/libexec/ssh-keysign",
    "/usr/libexec/sftp-server",
    "/etc/ssh/sshd_config",
    "/usr/sbin/frida-server",
    // TrollStore-era tooling
    "/var/mobile/Library/TrollDecrypt",
    "/var/mobile/Documents/.misaka",
    "/private/var/mobile/Library/Filza",
    "/var/mobile/Library/Preferences/com.tigisoftware.Filza.plist",
    "/private/var/mobile/Library/ADManager",
    "/var/mobile/Library/Preferences/wiki.qaq.trapp.plist",
    "/var/mobile/Library/Preferences/com.huami.TrollFools.plist",
    "/var/mobile/Library/Preferences/com.charlieleung.TrollOpen.plist",
    "/private/var/mobile/Library/HTTPStorages/com.leemin.Cowabunga",
    "/private/var/mobile/Documents/DumpDecrypter",
    // Tweak preferences
    "/Library/MobileSubstrate/DynamicLibraries/LiveClock.plist",
    "/Library/MobileSubstrate/DynamicLibraries/Veency.plist",
    // Exploit and utility leftovers
    "/private/var/Users",
    "/usr/lib/system/introspectionNSZombieEnabled",
    "/hmd_tmp_file",
    "/private/var/mobile/Library/varClean",
    "/private/var/mobile/IPCCReplacer",
    "/private/var/mobile/testrebuild",
    // Data left by TrollStore-installed tools
    "/private/var/mobile/Library/Saved Application State/com.xiaobovlog.ipcc.savedState",
    "/var/mobile/Library/Caches/com.tigisoftware.Filza",
    "/var/mobile/Library/SplashBoard/Snapshots/com.tigisoftware.Filza",
    "/var/mobile/Library/Application Support/Containers/com.tigisoftware.Filza",
    "/var/mobile/Library/Saved Application State/com.tigisoftware.Filza.savedState",
    "/var/mobile/Library/HTTPStorages/com.tigisoftware.Filza",
    "/private/var/mobile/Library/SplashBoard/Snapshots/com.tigisoftware.Filza",
    "/private/var/mobile/Library/Saved Application State/com.tigisoftware.Filza.savedState",
    "/var/mobile/Library/Preferences/com.tigisoftware.ADManager.plist",
    "/var/mobile/Library/HTTPStorages/com.tigisoftware.ADManager",
    "/private/var/mobile/Library/Caches/com.tigisoftware.ADManager",
    "/private/var/mobile/Library/SplashBoard/Snapshots/com.tigisoftware.ADManager",
    "/private/var/mobile/Library/SplashBoard/Snapshots/com.callassist.batteryinfolist",
    "/var/mobile/Library/Preferences/com.rbtdigital.BatteryLife.plist",
    "/var/mobile/Library/Preferences/com.rbtdigital.BatteryLife.history.plist",
    "/var/mobile/Library/HTTPStorages/com.rbtdigital.BatteryLife",
    "/private/var/mobile/Library/SplashBoard/Snapshots/com.rbtdigital.BatteryLife",
    "/private/var/mobile/Library/Saved Application State/com.rbtdigital.BatteryLife.savedState",
    "/private/var/mobile/Library/Caches/com.rbtdigital.BatteryLife",
    "/private/var/mobile/Library/WebKit/com.rbtdigital.BatteryLife",
    "/var/mobile/Library/Preferences/me.tomt000.copylog.plist",
    "/var/mobile/Library/Preferences/me.tomt000.copylog.other.plist",
    "/private/var/mobile/Library/HTTPStorages/com.leemin.SecondHand",
    "/private/var/mobile/Library/Saved Application State/com.leemin.Cowabunga.savedState",
    "/private/var/mobile/Library/Saved Application State/com.leemin.SecondHand.savedState",
    "/private/var/mobile/Library/Caches/com.leemin.Cowabunga",
    "/private/var/mobile/Library/HTTPStorages/live.cclerc.geranium",
    "/private/var/mobile/Library/HTTPStorages/net.sourceloc.AirTroller",
    "/private/var/mobile/Library/Caches/ru.domo.cocoatop64",
    "/var/mobile/Library/Preferences/NiceCaller.plist",
    "/var/mobile/Library/Preferences/NiceRecorder-Troll.plist",
    "/var/mobile/Library/Preferences/wiki.qaq.trapp-orbit.plist",
    "/var/mobile/Library/Preferences/wiki.qaq.trapp-tweak.plist",
    "/var/mobile/Library/Preferences/wiki.qaq.trapp.safe-area.plist",
    "/var/mobile/Library/Preferences/wiki.qaq.trapp",
    "/var/mobile/Library/Preferences/wiki.qaq.trapp/Preferences",
    "/private/var/mobile/Library/HTTPStorages/wiki.qaq.trapp",
    "/private/var/mobile/Library/Caches/wiki.qaq.trapp",
    "/private/var/mobile/Library/Application Support/bugsnag-shared-wiki.qaq.trapp",
    "/private/var/mobile/Media/TrollRecorder",
    "/var/mobile/Library/Preferences/wiki.qaq.ai.gate",
    "/var/mobile/Library/Preferences/xc.lzsxcl.Trollo2e.plist",
    "/var/mobile/Library/Preferences/ca.bomberfish.SwiftTop.plist",
    "/var/mobile/Library/Preferences/ch.xxtou.hudapp.plist",
    "/var/mobile/Library/Preferences/chaoge.ChargeLimiter.plist",
    "/var/mobile/Library/Preferences/chaoge.AlDente.plist",
    "/var/mobile/Library/Preferences/cn.bswbw.AppsDump.plist",
    "/var/mobile/Library/Preferences/cn.gblw.AppsDump.plist",
    "/var/mobile/Library/Preferences/com.zlwl.appsdump.plist",
    "/var/mobile/Library/Preferences/com.82flex.reveil.PinStorage.plist",
    "/var/mobile/Library/Preferences/com.netskao.downgradeapp.plist",
    "/var/mobile/Library/Preferences/com.netskao.downgradeappsettings.plist",
    "/private/var/mobile/Library/HTTPStorages/com.netskao.downgradeapp",
    "/private/var/mobile/Library/Caches/com.netskao.downgradeapp",
    "/private/var/mobile/Library/Saved Application State/com.netskao.downgradeapp.savedState",
    "/var/mobile/Library/Preferences/com.serena.santanderfm.plist",
    "/var/mobile/Library/Preferences/com.simloc.app.plist",
    "/var/mobile/Library/Preferences/net.limneos.AudioRecorder.plist",
    "/var/mobile/Library/Preferences/net.limneos.audiorecorder.plist",
    "/var/mobile/Library/Preferences/com.leemin.helium.plist",
    "/private/var/mobile/Library/HTTPStorages/com.mika.LocationSimulation",
    "/private/var/mobile/Library/HTTPStorages/com.gamegod.igg",
    "/private/var/mobile/Library/Caches/com.gamegod.igg",
    "/private/var/mobile/Documents/DumpIpa",
    "/var/mobile/Library/Preferences/com.DebianArch.ScarletPersonalXYZ.plist",
    "/var/mobile/Library/Preferences/com.cisc0freak.cardio.plist",
    "/var/mobile/Library/Preferences/com.muyang.ioszhushou.plist",
    "/var/mobile/Library/Preferences/com.serena.AppIndex.plist",
    "/var/mobile/Library/Preferences/com.susu.cleaner.plist",
    "/private/var/mobile/Library/SplashBoard/Snapshots/com.amywhile.Aemulo",
    "/private/var/mobile/Library/WebKit/com.amywhile.Aemulo",
    "/private/var/mobile/Library/Saved Application State/com.amywhile.Aemulo.savedState",
    "/private/var/mobile/Library/SplashBoard/Snapshots/com.leemin.Cowabunga",
    "/private/var/mobile/Library/SplashBoard/Snapshots/com.netskao.injectwechat",
    "/private/var/mobile/Library/SplashBoard/Snapshots/com.niceios.Battery.Battery",
    "/private/var/mobile/Library/SplashBoard/Snapshots/com.straight-tamago.Osushi",
    "/private/var/mobile/Library/SplashBoard/Snapshots/com.xiaobovlog.FastReboot",
    "/private/var/mobile/Library/SplashBoard/Snapshots/com.xiaobovlog.ipcc",
    "/private/var/mobile/Library/SplashBoard/Snapshots/live.cclerc.geranium",
    "/private/var/mobile/Library/SplashBoard/Snapshots/wiki.qaq.TrollFools",
    "/private/var/mobile/Library/SplashBoard/Snapshots/xc.lzsxcl.Trollo2e",
    "/private/var/mobile/Library/SplashBoard/Snapshots/com.huami.TrollFools",
    "/private/var/mobile/Library/SplashBoard/Snapshots/com.ichitaso.otadisablerts",
    "/private/var/mobile/Library/SplashBoard/Snapshots/com.ui.speed",
    "/private/var/mobile/Library/SplashBoard/Snapshots/ru.domo.cocoatop64",
    "/private/var/mobile/Library/Saved Application State/ca.bomberfish.SwiftTop.savedState",
    "/private/var/mobile/Library/Saved Application State/chaoge.AlDente.savedState",
    "/private/var/mobile/Library/Saved Application State/chaoge.ChargeLimiter.savedState",
    "/private/var/mobile/Library/Saved Application State/cn.bswbw.AppsDump.savedState",
    "/private/var/mobile/Library/Saved Application State/cn.bswbw.DEB.backup.savedState",
    "/private/var/mobile/Library/Saved Application State/cn.bswbw.xflw.savedState",
    "/private/var/mobile/Library/Saved Application State/com.34306.watching.savedState",
    "/private/var/mobile/Library/Saved Application State/com.avangelista.Appabetical.savedState",
    "/private/var/mobile/Library/Saved Application State/com.callassist.batteryinfolist.savedState",
    "/private/var/mobile/Library/Saved Application State/com.callassist.deviceinfolist.savedState",
    "/private/var/mobile/Library/Saved Application State/com.hqgame.popo2.savedState",
    "/private/var/mobile/Library/Saved Application State/com.huami.SuperIcons.savedState",
    "/private/var/mobile/Library/Saved Application State/com.ichitaso.otadisablerts.savedState",
    "/private/var/mobile/Library/Saved Application State/com.mika.LocationSimulation.savedState",
    "/private/var/mobile/Library/Saved Application State/com.netskao.injectwechat.savedState",
    "/private/var/mobile/Library/Saved Application State/com.niceios.Battery.Battery.savedState",
    "/private/var/mobile/Library/Saved Application State/com.serena.santanderfm.savedState",
    "/private/var/mobile/Library/Saved Application State/com.straight-tamago.Osushi.savedState",
    "/private/var/mobile/Library/Saved Application State/com.straight-tamago.uiharux-pro.savedState",
    "/private/var/mobile/Library/Saved Application State/com.tigisoftware.ADManager.savedState",
    "/private/var/mobile/Library/Saved Application State/com.xiaobovlog.FastReboot.savedState",
    "/private/var/mobile/Library/Saved Application State/live.cclerc.geranium.savedState",
    "/private/var/mobile/Library/Saved Application State/net.sourceloc.AirTroller.savedState",
    "/private/var/mobile/Library/Saved Application State/net.sourceloc.TrollTools.savedState",
    "/private/var/mobile/Library/Saved Application State/org.haxi0.Derootifier.savedState",
    "/private/var/mobile/Library/Saved Application State/ru.domo.cocoatop64.savedState",
    "/private/var/mobile/Library/Saved Application State/wiki.qaq.TrollFools.savedState",
    "/private/var/mobile/Library/Saved Application State/xc.lzsxcl.Trollo2e.savedState",
    "/private/var/mobile/Library/Saved Application State/cn.gblw.AppsDump.savedState",
    "/private/var/mobile/Library/Saved Application State/com.huami.TrollFools.savedState",
    "/private/var/mobile/Library/Saved Application State/com.serena.AppIndex.savedState",
    "/private/var/mobile/Library/Saved Application State/com.ui.speed.savedState",
];

/// Root and hooking-framework artifacts on Android.
#[cfg_attr(not(any(test, target_os = "android")), allow(dead_code))]
const ANDROID_PATHS: &[&str] = &[
    "/system/bin/su",
    "/system/xbin/su",
    "/sbin/su",
    "/system/su",
    "/data/local/xbin/su",
    "/data/local/bin/su",
    "/data/local/su",
    "/system/sd/xbin/su",
    "/system/bin/failsafe/su",
    "/data/adb/magisk",
    "/sbin/.magisk",
    "/cache/.disable_magisk",
    "/dev/.magisk.unblock",
    "/data/data/com.topjohnwu.magisk",
    "/data/data/eu.chainfire.supersu",
    "/data/data/com.noshufou.android.su",
    "/data/data/com.koushikdutta.superuser",
    "/system/framework/XposedBridge.jar",
    "/system/xposed.prop",
    "/data/data/de.robv.android.xposed.installer",
    "/data/data/io.github.lsposed.manager",
    "/data/local/tmp/frida-server",
];

#[cfg(target_os = "ios")]
const BUILTIN_PATHS: &[&str] = IOS_PATHS;

#[cfg(target_os = "android")]
const BUILTIN_PATHS: &[&str] = ANDROID_PATHS;

// Desktop hosts legitimately carry shells, package managers and sshd.
#[cfg(not(any(target_os = "ios", target_os = "android")))]
const BUILTIN_PATHS: &[&str] = &[];

/// System files present on every stock iOS install.
#[cfg(target_os = "ios")]
const BUILTIN_CONTROLS: &[&str] = &[
    "/usr/lib/dyld",
    "/System/Library/CoreServices/SystemVersion.plist",
];

#[cfg(not(target_os = "ios"))]
const BUILTIN_CONTROLS: &[&str] = &[];

/// Checks for paths that only exist after a jailbreak.
#[derive(Debug, Clone)]
pub struct FilesystemProbe {
    paths: Vec<String>,
    controls: Vec<String>,
}

/// Outcome of one path lookup.
#[derive(Debug)]
enum PathState {
    Present,
    Absent,
    Unknown(io::Error),
}

impl FilesystemProbe {
    /// Probe over an explicit path list.
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            controls: Vec::new(),
        }
    }

    /// Paths that must exist; one reported absent counts as tampering.
    #[must_use]
    pub fn with_controls<I, S>(mut self, controls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.controls = controls.into_iter().map(Into::into).collect();
        self
    }

    /// Built-in platform indicators plus `config.extra_paths`, and the
    /// built-in control paths.
    pub fn from_config(config: &DetectConfig) -> Self {
        let paths = BUILTIN_PATHS
            .iter()
            .map(|p| (*p).to_string())
            .chain(config.extra_paths.iter().cloned());
        Self::new(paths).with_controls(BUILTIN_CONTROLS.iter().copied())
    }

    /// Paths this probe checks.
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Paths expected to exist.
    pub fn controls(&self) -> &[String] {
        &self.controls
    }

    /// First control path that lookups claim is missing.
    fn hidden_control(&self) -> Option<&str> {
        self.controls
            .iter()
            .find(|c| matches!(path_state(Path::new(c.as_str())), PathState::Absent))
            .map(String::as_str)
    }
}

fn path_state(path: &Path) -> PathState {
    match std::fs::symlink_metadata(path) {
        Ok(_) => PathState::Present,
        Err(e) if e.kind() == io::ErrorKind::NotFound => PathState::Absent,
        Err(e) => PathState::Unknown(e),
    }
}

impl Probe for FilesystemProbe {
    fn label(&self) -> &'static str {
        LABEL
    }

    fn run(&self) -> ProbeResult {
        if let Some(control) = self.hidden_control() {
            debug!(path = %control, "Filesystem: system file hidden from lookups");
            return ProbeResult::tampered(LABEL, format!("missing system file {control}"));
        }

        if self.paths.is_empty() {
            return ProbeResult::inconclusive(LABEL, "no indicator paths for this platform");
        }

        let mut order: Vec<&String> = self.paths.iter().collect();
        order.shuffle(&mut rand::thread_rng());

        let mut unknown = 0usize;
        let mut last_error = None;
        for path in order {
            match path_state(Path::new(path)) {
                PathState::Present => {
                    debug!(path = %path, "Filesystem: jailbreak artifact present");
                    return ProbeResult::tampered(LABEL, path.as_str());
                },
                PathState::Absent => {},
                PathState::Unknown(e) => {
                    unknown += 1;
                    last_error = Some(e);
                },
            }
        }

        if unknown == self.paths.len() {
            let detail = last_error.map_or_else(
                || "no path could be checked".to_string(),
                |e| e.to_string(),
            );
            return ProbeResult::inconclusive(LABEL, detail);
        }
        ProbeResult::clean(LABEL)
    }

    fn weight(&self) -> Weight {
        Weight::Strong
    }
}
