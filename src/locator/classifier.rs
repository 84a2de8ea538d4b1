//! Package provenance classification for Go stack frames.
//!
//! Profiles from Go programs statically link everything into one binary, so
//! only the package path tells user code apart from the runtime, the
//! standard library, and dependencies. Classification resolves in strict
//! priority order:
//!
//! 1. **Runtime** - `runtime` and `runtime/...`
//! 2. **Stdlib** - the embedded standard library package list, dotless
//!    first segments of stdlib packages, and `golang.org/x/...`
//! 3. **Business** - `main`, slashless local packages, and anything under
//!    the configured module path
//! 4. **Third-party** - configured prefixes and common hosting domains
//! 5. **Unknown** - everything else

use std::collections::HashSet;
use std::io;
use std::path::Path;

use super::{CodeCategory, LocatorConfig};

/// Common third-party hosting prefixes (package paths).
const HOSTING_PREFIXES: &[&str] = &[
    "github.com/",
    "gitlab.com/",
    "bitbucket.org/",
    "gopkg.in/",
    "go.uber.org/",
    "google.golang.org/",
    "cloud.google.com/",
    "k8s.io/",
    "sigs.k8s.io/",
];

/// Classifies package paths into [`CodeCategory`] values.
pub struct Classifier {
    module_name: Option<String>,
    third_party_prefixes: Vec<String>,
    stdlib_packages: HashSet<&'static str>,
}

impl Classifier {
    /// Create a classifier from the locator configuration.
    #[must_use]
    pub fn new(config: &LocatorConfig) -> Classifier {
        Classifier {
            module_name: config.module_name.clone().filter(|name| !name.is_empty()),
            third_party_prefixes: config.third_party_prefixes.clone(),
            stdlib_packages: GO_STDLIB_PACKAGES.iter().copied().collect(),
        }
    }

    /// Classify a package path. Empty input is `Unknown`.
    #[must_use]
    pub fn classify(&self, package_name: &str) -> CodeCategory {
        if package_name.is_empty() {
            return CodeCategory::Unknown;
        }
        if self.is_runtime_package(package_name) {
            return CodeCategory::Runtime;
        }
        if self.is_stdlib_package(package_name) {
            return CodeCategory::Stdlib;
        }
        if self.is_business_package(package_name) {
            return CodeCategory::Business;
        }
        if self.is_third_party_package(package_name) {
            return CodeCategory::ThirdParty;
        }
        CodeCategory::Unknown
    }

    fn is_runtime_package(&self, package_name: &str) -> bool {
        package_name == "runtime" || package_name.starts_with("runtime/")
    }

    fn is_stdlib_package(&self, package_name: &str) -> bool {
        if self.stdlib_packages.contains(package_name) {
            return true;
        }

        // Subpackages like net/http/httptest: check the first path segment,
        // rejecting domain-style prefixes such as gopkg.in.
        let top_level = package_name.split('/').next().unwrap_or(package_name);
        if self.stdlib_packages.contains(top_level) && !top_level.contains('.') {
            return true;
        }

        // golang.org/x/* counts as extended stdlib.
        package_name.starts_with("golang.org/x/")
    }

    fn is_business_package(&self, package_name: &str) -> bool {
        // The main package is always user code.
        if package_name == "main" || package_name.starts_with("main.") {
            return true;
        }

        // Slashless packages that survived the runtime and stdlib checks are
        // local, unqualified packages.
        if !package_name.contains('/')
            && !self.is_runtime_package(package_name)
            && !self.is_stdlib_package(package_name)
        {
            return true;
        }

        match &self.module_name {
            Some(module) => {
                package_name == module || package_name.starts_with(&format!("{module}/"))
            }
            None => false,
        }
    }

    fn is_third_party_package(&self, package_name: &str) -> bool {
        if self.third_party_prefixes.iter().any(|prefix| package_name.starts_with(prefix)) {
            return true;
        }

        for domain in HOSTING_PREFIXES {
            if package_name.starts_with(domain) {
                // Anything under the user's own module stays out of
                // third-party even when hosted on a known domain.
                if let Some(module) = &self.module_name {
                    if package_name.starts_with(module.as_str()) {
                        return false;
                    }
                }
                return true;
            }
        }

        false
    }
}

/// Read the module path from `<dir>/go.mod`. Fails with `NotFound` when the
/// file is missing or carries no `module` declaration.
pub fn detect_module_name(dir: &Path) -> io::Result<String> {
    let contents = std::fs::read_to_string(dir.join("go.mod"))?;
    for line in contents.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("module ") {
            return Ok(rest.trim().to_string());
        }
    }
    Err(io::Error::new(io::ErrorKind::NotFound, "no module declaration in go.mod"))
}

/// Go standard library package names. Internal packages are included because
/// they show up in call stacks even though user code never imports them.
const GO_STDLIB_PACKAGES: &[&str] = &[
    "archive",
    "archive/tar",
    "archive/zip",
    "bufio",
    "builtin",
    "bytes",
    "compress",
    "compress/bzip2",
    "compress/flate",
    "compress/gzip",
    "compress/lzw",
    "compress/zlib",
    "container",
    "container/heap",
    "container/list",
    "container/ring",
    "context",
    "crypto",
    "crypto/aes",
    "crypto/cipher",
    "crypto/des",
    "crypto/dsa",
    "crypto/ecdh",
    "crypto/ecdsa",
    "crypto/ed25519",
    "crypto/elliptic",
    "crypto/hmac",
    "crypto/md5",
    "crypto/rand",
    "crypto/rc4",
    "crypto/rsa",
    "crypto/sha1",
    "crypto/sha256",
    "crypto/sha512",
    "crypto/subtle",
    "crypto/tls",
    "crypto/x509",
    "crypto/x509/pkix",
    "database",
    "database/sql",
    "database/sql/driver",
    "debug",
    "debug/buildinfo",
    "debug/dwarf",
    "debug/elf",
    "debug/gosym",
    "debug/macho",
    "debug/pe",
    "debug/plan9obj",
    "embed",
    "encoding",
    "encoding/ascii85",
    "encoding/asn1",
    "encoding/base32",
    "encoding/base64",
    "encoding/binary",
    "encoding/csv",
    "encoding/gob",
    "encoding/hex",
    "encoding/json",
    "encoding/pem",
    "encoding/xml",
    "errors",
    "expvar",
    "flag",
    "fmt",
    "go",
    "go/ast",
    "go/build",
    "go/build/constraint",
    "go/constant",
    "go/doc",
    "go/doc/comment",
    "go/format",
    "go/importer",
    "go/parser",
    "go/printer",
    "go/scanner",
    "go/token",
    "go/types",
    "hash",
    "hash/adler32",
    "hash/crc32",
    "hash/crc64",
    "hash/fnv",
    "hash/maphash",
    "html",
    "html/template",
    "image",
    "image/color",
    "image/color/palette",
    "image/draw",
    "image/gif",
    "image/jpeg",
    "image/png",
    "index",
    "index/suffixarray",
    "io",
    "io/fs",
    "io/ioutil",
    "log",
    "log/slog",
    "log/syslog",
    "maps",
    "math",
    "math/big",
    "math/bits",
    "math/cmplx",
    "math/rand",
    "mime",
    "mime/multipart",
    "mime/quotedprintable",
    "net",
    "net/http",
    "net/http/cgi",
    "net/http/cookiejar",
    "net/http/fcgi",
    "net/http/httptest",
    "net/http/httptrace",
    "net/http/httputil",
    "net/http/pprof",
    "net/mail",
    "net/netip",
    "net/rpc",
    "net/rpc/jsonrpc",
    "net/smtp",
    "net/textproto",
    "net/url",
    "os",
    "os/exec",
    "os/signal",
    "os/user",
    "path",
    "path/filepath",
    "plugin",
    "reflect",
    "regexp",
    "regexp/syntax",
    "slices",
    "sort",
    "strconv",
    "strings",
    "sync",
    "sync/atomic",
    "syscall",
    "testing",
    "testing/fstest",
    "testing/iotest",
    "testing/quick",
    "text",
    "text/scanner",
    "text/tabwriter",
    "text/template",
    "text/template/parse",
    "time",
    "time/tzdata",
    "unicode",
    "unicode/utf16",
    "unicode/utf8",
    "unsafe",
    "internal",
];
