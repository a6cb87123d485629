//! Shared test fixture: a real meta-repository with file-protocol
//! submodules, driven through the git CLI.
//!
//! Layout per fixture:
//!
//! - `remotes/meta.git`, `remotes/<sub>.git` - bare remotes
//! - `seed/<sub>` - working clone used to author submodule commits
//! - `meta` - working clone of the meta-repo with submodules added
//!
//! File-protocol submodule cloning needs `protocol.file.allow=always`
//! on modern git, so every command here passes it.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use git_weld::core::types::Oid;
use git_weld::git::Git;

/// A meta-repository with one or more submodules and bare remotes.
pub struct MetaRepo {
    dir: TempDir,
}

impl MetaRepo {
    /// Create a meta-repo with an initial commit and the given
    /// submodules, each seeded with one commit and registered under its
    /// own name.
    pub fn with_submodules(names: &[&str]) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let remotes = dir.path().join("remotes");
        std::fs::create_dir_all(&remotes).unwrap();

        // Bare meta remote, then a working clone.
        git(&remotes, &["init", "--bare", "meta.git"]);
        git(
            dir.path(),
            &["clone", remotes.join("meta.git").to_str().unwrap(), "meta"],
        );
        let meta = dir.path().join("meta");
        configure_user(&meta);

        std::fs::write(meta.join("README.md"), "# meta\n").unwrap();
        git(&meta, &["add", "README.md"]);
        git(&meta, &["commit", "-m", "initial"]);

        let fixture = Self { dir };
        for name in names {
            fixture.add_submodule(name);
        }
        // `submodule add` leaves .gitmodules and the gitlinks staged.
        if !names.is_empty() {
            fixture.git_meta(&["commit", "-m", "add submodules"]);
        }
        fixture
    }

    fn add_submodule(&self, name: &str) {
        let remotes = self.dir.path().join("remotes");
        let bare = remotes.join(format!("{name}.git"));
        git(&remotes, &["init", "--bare", &format!("{name}.git")]);
        git(&bare, &["symbolic-ref", "HEAD", "refs/heads/main"]);

        // Seed clone with one commit.
        let seed = self.dir.path().join("seed").join(name);
        std::fs::create_dir_all(seed.parent().unwrap()).unwrap();
        git(
            self.dir.path(),
            &[
                "clone",
                bare.to_str().unwrap(),
                seed.to_str().unwrap(),
            ],
        );
        configure_user(&seed);
        std::fs::write(seed.join("lib.rs"), format!("// {name}\n")).unwrap();
        git(&seed, &["add", "lib.rs"]);
        git(&seed, &["commit", "-m", "seed"]);
        git(&seed, &["push", "origin", "HEAD:refs/heads/main"]);

        self.git_meta(&[
            "submodule",
            "add",
            bare.to_str().unwrap(),
            name,
        ]);
        configure_user(&self.meta_path().join(name));
    }

    /// The meta-repo working directory.
    pub fn meta_path(&self) -> PathBuf {
        self.dir.path().join("meta")
    }

    /// The seed clone for a submodule.
    pub fn seed_path(&self, name: &str) -> PathBuf {
        self.dir.path().join("seed").join(name)
    }

    /// The bare remote of the meta-repo.
    pub fn meta_remote(&self) -> PathBuf {
        self.dir.path().join("remotes").join("meta.git")
    }

    /// The bare remote of a submodule.
    pub fn sub_remote(&self, name: &str) -> PathBuf {
        self.dir.path().join("remotes").join(format!("{name}.git"))
    }

    /// Open the meta-repo through the library.
    pub fn git(&self) -> Git {
        Git::open(&self.meta_path()).expect("failed to open meta repo")
    }

    /// Run git in the meta-repo.
    pub fn git_meta(&self, args: &[&str]) {
        git(&self.meta_path(), args);
    }

    /// Run git in an open submodule of the meta-repo.
    pub fn git_sub(&self, name: &str, args: &[&str]) {
        git(&self.meta_path().join(name), args);
    }

    /// Commit a file in the meta-repo and return the new HEAD.
    pub fn commit_meta_file(&self, path: &str, content: &str, message: &str) -> Oid {
        std::fs::write(self.meta_path().join(path), content).unwrap();
        self.git_meta(&["add", path]);
        self.git_meta(&["commit", "-m", message]);
        self.head(&self.meta_path())
    }

    /// Commit a file inside an open submodule and return its new HEAD.
    pub fn commit_sub_file(&self, name: &str, path: &str, content: &str, message: &str) -> Oid {
        let dir = self.meta_path().join(name);
        std::fs::write(dir.join(path), content).unwrap();
        self.git_sub(name, &["add", path]);
        self.git_sub(name, &["commit", "-m", message]);
        self.head(&dir)
    }

    /// Stage a submodule's current HEAD in the meta index and commit.
    pub fn commit_gitlink(&self, name: &str, message: &str) -> Oid {
        self.git_meta(&["add", name]);
        self.git_meta(&["commit", "-m", message]);
        self.head(&self.meta_path())
    }

    /// HEAD of an arbitrary repository in the fixture.
    pub fn head(&self, dir: &Path) -> Oid {
        let output = Command::new("git")
            .args(["rev-parse", "HEAD"])
            .current_dir(dir)
            .output()
            .expect("git rev-parse failed");
        assert!(output.status.success());
        let sha = String::from_utf8(output.stdout).unwrap().trim().to_string();
        Oid::new(sha).unwrap()
    }

    /// HEAD of the meta-repo.
    pub fn meta_head(&self) -> Oid {
        self.head(&self.meta_path())
    }

    /// HEAD of an open submodule.
    pub fn sub_head(&self, name: &str) -> Oid {
        self.head(&self.meta_path().join(name))
    }
}

/// Run a git command, panicking with stderr on failure.
pub fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .arg("-c")
        .arg("protocol.file.allow=always")
        .arg("-c")
        .arg("init.defaultBranch=main")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed to spawn");

    if !output.status.success() {
        panic!(
            "git {:?} in {} failed: {}",
            args,
            dir.display(),
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

/// Run a git command and capture stdout.
pub fn git_stdout(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-c")
        .arg("protocol.file.allow=always")
        .arg("-c")
        .arg("init.defaultBranch=main")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed to spawn");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}

fn configure_user(dir: &Path) {
    git(dir, &["config", "user.email", "test@example.com"]);
    git(dir, &["config", "user.name", "Test User"]);
}
