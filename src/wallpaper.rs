use std::path::Path;

/// Contract the slideshow loop depends on: apply a local file as the
/// desktop background, reporting success as a plain boolean.
pub trait WallpaperApplier: Send + Sync {
    fn apply(&self, path: &Path) -> bool;
}

/// Applies wallpapers through the host operating system.
#[derive(Debug, Default)]
pub struct SystemWallpaper;

impl WallpaperApplier for SystemWallpaper {
    fn apply(&self, path: &Path) -> bool {
        match platform::set_wallpaper(path) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("failed to set wallpaper {}: {err}", path.display());
                false
            }
        }
    }
}

#[cfg(windows)]
mod platform {
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;
    use std::path::Path;

    use anyhow::{anyhow, Result};
    use windows::Win32::UI::WindowsAndMessaging::{
        SystemParametersInfoW, SPI_SETDESKWALLPAPER, SPIF_SENDCHANGE, SPIF_UPDATEINIFILE,
    };
    use winreg::enums::{HKEY_CURRENT_USER, KEY_SET_VALUE};
    use winreg::RegKey;

    pub fn set_wallpaper(path: &Path) -> Result<()> {
        set_fill_style()?;
        let wide_path = to_wide_null(path);
        unsafe {
            SystemParametersInfoW(
                SPI_SETDESKWALLPAPER,
                0,
                Some(wide_path.as_ptr() as *mut _),
                SPIF_UPDATEINIFILE | SPIF_SENDCHANGE,
            )
        }
        .map_err(|err| anyhow!("SystemParametersInfoW failed: {err}"))?;
        Ok(())
    }

    // WallpaperStyle 10 / TileWallpaper 0 is the "fill" mode.
    fn set_fill_style() -> Result<()> {
        let hkcu = RegKey::predef(HKEY_CURRENT_USER);
        let desktop = hkcu.open_subkey_with_flags("Control Panel\\Desktop", KEY_SET_VALUE)?;
        desktop.set_value("WallpaperStyle", &"10")?;
        desktop.set_value("TileWallpaper", &"0")?;
        Ok(())
    }

    fn to_wide_null(path: &Path) -> Vec<u16> {
        OsStr::new(path)
            .encode_wide()
            .chain(std::iter::once(0))
            .collect()
    }
}

#[cfg(not(windows))]
mod platform {
    use std::path::Path;

    use anyhow::{anyhow, Result};

    pub fn set_wallpaper(_path: &Path) -> Result<()> {
        Err(anyhow!("setting the wallpaper is only supported on Windows"))
    }
}
