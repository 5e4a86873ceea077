use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Search type selector. `All` lets every file through; the others keep only
/// filenames ending in one of the category's extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Category {
    #[default]
    All,
    Audio,
    Videos,
    Software,
    Books,
    Photos,
    Archives,
}

const AUDIO: &[&str] = &[
    // core
    ".mp3", ".ogg", ".opus", ".flac", ".wav", ".aac", ".m4a", ".wma", ".alac",
    // hi-res and containers
    ".ape", ".aiff", ".aif", ".aifc", ".mka", ".wv", ".tta", ".mpc", ".ra", ".ram", ".oga",
    ".ac3", ".dts",
    // midi and trackers
    ".mid", ".midi", ".kar", ".mod", ".xm", ".it", ".s3m",
    ".amr", ".caf", ".spx", ".mp2", ".mp1",
    // dsd
    ".dsf", ".dff",
    ".mogg",
];

const VIDEOS: &[&str] = &[
    ".avi", ".mp4", ".mkv", ".mov", ".wmv", ".flv", ".webm",
    // mpeg family
    ".mpg", ".mpeg", ".mpe", ".m1v", ".m2v", ".m4v",
    ".3gp", ".3g2", ".ts", ".m2ts", ".mts", ".vob",
    ".ogv", ".ogm", ".divx", ".rm", ".rmvb", ".asf", ".f4v", ".mxf", ".dv", ".qt",
    // broadcast recordings
    ".wtv", ".dvr-ms", ".trp", ".tp", ".tod",
    // elementary streams
    ".h264", ".h265", ".hevc", ".av1", ".y4m",
    ".mk3d",
];

const SOFTWARE: &[&str] = &[
    // windows
    ".exe", ".msi", ".msix", ".msixbundle", ".appx", ".appxbundle", ".msu", ".cab",
    // macos
    ".dmg", ".pkg", ".mpkg", ".app", ".kext", ".saver",
    // linux/bsd
    ".deb", ".rpm", ".apk", ".appimage", ".snap", ".flatpak", ".flatpakref", ".flatpakrepo",
    ".run", ".bin", ".sh",
    ".pkg.tar.zst", ".pkg.tar.xz", ".pkg.tar.gz",
    ".iso", ".img",
];

const BOOKS: &[&str] = &[
    ".pdf", ".epub", ".mobi", ".azw", ".azw3", ".djvu", ".cbz", ".cbr",
    ".txt", ".rtf", ".doc", ".docx", ".odt",
];

const PHOTOS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".tif", ".webp",
    ".heic", ".heif", ".raw", ".cr2", ".nef", ".arw", ".orf", ".rw2", ".sr2",
];

const ARCHIVES: &[&str] = &[
    ".7z", ".rar", ".zip", ".zipx", ".tar",
    // compressed tars
    ".tgz", ".tbz", ".tbz2", ".txz", ".tzst",
    // single-stream compression
    ".gz", ".bz2", ".xz", ".zst", ".lz", ".lzma", ".lz4", ".z",
    ".cab", ".arj", ".ace", ".arc", ".lha", ".lzh", ".sit", ".sitx", ".pax",
    // game archives
    ".pak", ".pk3", ".pk4", ".wad",
    // disc images
    ".iso", ".img", ".nrg", ".bin", ".cue", ".mdf", ".mds", ".ccd", ".isz", ".dmg",
    // comic book archives
    ".cbz", ".cbr", ".cb7", ".cbt",
];

impl Category {
    pub const ALL: [Category; 7] = [
        Category::All,
        Category::Audio,
        Category::Videos,
        Category::Software,
        Category::Books,
        Category::Photos,
        Category::Archives,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::All => "All",
            Category::Audio => "Audio",
            Category::Videos => "Videos",
            Category::Software => "Software",
            Category::Books => "Books",
            Category::Photos => "Photos",
            Category::Archives => "Archives",
        }
    }

    /// Extension set for the category, all lowercase with the leading dot.
    /// `None` for `All`.
    pub fn extensions(self) -> Option<&'static [&'static str]> {
        match self {
            Category::All => None,
            Category::Audio => Some(AUDIO),
            Category::Videos => Some(VIDEOS),
            Category::Software => Some(SOFTWARE),
            Category::Books => Some(BOOKS),
            Category::Photos => Some(PHOTOS),
            Category::Archives => Some(ARCHIVES),
        }
    }

    pub fn matches(self, filename: &str) -> bool {
        let Some(exts) = self.extensions() else {
            return true;
        };
        let name = filename.to_lowercase();
        exts.iter().any(|ext| name.ends_with(ext))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(Category::All),
            "audio" | "music" => Ok(Category::Audio),
            "video" | "videos" => Ok(Category::Videos),
            "software" | "apps" => Ok(Category::Software),
            "books" | "documents" | "docs" => Ok(Category::Books),
            "photos" | "images" | "pictures" => Ok(Category::Photos),
            "archives" | "archive" => Ok(Category::Archives),
            other => Err(format!("unknown search type: {other}")),
        }
    }
}
