//! Build script for ABI compatibility testing
//!
//! Writes the newlib-side declarations the shim must agree with (the
//! `<sys/mman.h>` and `<sys/errno.h>` values, the pthread attribute structs
//! and the mutex/barrier storage layout) into a C file and compiles it, so the
//! tests can compare against what a C compiler actually produces.

use std::env;
use std::path::Path;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));

    generate_reference_c_code(&out_dir);

    println!("cargo:rerun-if-changed=build.rs");
}

fn generate_reference_c_code(out_dir: &Path) {
    let c_code = r#"
#include <stddef.h>
#include <stdint.h>

/* <sys/cpuset.h> */
typedef struct {
    uint32_t __bits;
} cpu_set_t;

/* <sys/_pthreadtypes.h> */
typedef uint32_t pthread_t;

typedef struct {
    int detachstate;
    cpu_set_t affinity;
} pthread_attr_t;

typedef struct {
    int is_initialized;
    int process_shared;
    int prio_ceiling;
    int protocol;
    int type;
    int recursive;
} pthread_mutexattr_t;

typedef struct {
    int is_initialized;
    int process_shared;
} pthread_barrierattr_t;

/* Mutex and barrier storage as the shim lays it out */
typedef struct {
    uint32_t futex_word;
    uint32_t owner;
    uint32_t lock_count;
    uint32_t attr;
} pthread_mutex_t;

typedef struct {
    pthread_mutex_t mutex;
    uint32_t generation;
    uint32_t thread_count;
    uint32_t nb_left;
} pthread_barrier_t;

size_t cpu_set_size(void) { return sizeof(cpu_set_t); }
size_t cpu_set_align(void) { return _Alignof(cpu_set_t); }
size_t pthread_t_size(void) { return sizeof(pthread_t); }

size_t pthread_attr_size(void) { return sizeof(pthread_attr_t); }
size_t pthread_attr_align(void) { return _Alignof(pthread_attr_t); }
size_t pthread_attr_detachstate_offset(void) { return offsetof(pthread_attr_t, detachstate); }
size_t pthread_attr_affinity_offset(void) { return offsetof(pthread_attr_t, affinity); }

size_t pthread_mutexattr_size(void) { return sizeof(pthread_mutexattr_t); }
size_t pthread_mutexattr_align(void) { return _Alignof(pthread_mutexattr_t); }
size_t pthread_mutexattr_is_initialized_offset(void) { return offsetof(pthread_mutexattr_t, is_initialized); }
size_t pthread_mutexattr_process_shared_offset(void) { return offsetof(pthread_mutexattr_t, process_shared); }
size_t pthread_mutexattr_prio_ceiling_offset(void) { return offsetof(pthread_mutexattr_t, prio_ceiling); }
size_t pthread_mutexattr_protocol_offset(void) { return offsetof(pthread_mutexattr_t, protocol); }
size_t pthread_mutexattr_type_offset(void) { return offsetof(pthread_mutexattr_t, type); }
size_t pthread_mutexattr_recursive_offset(void) { return offsetof(pthread_mutexattr_t, recursive); }

size_t pthread_barrierattr_size(void) { return sizeof(pthread_barrierattr_t); }
size_t pthread_barrierattr_process_shared_offset(void) { return offsetof(pthread_barrierattr_t, process_shared); }

size_t pthread_mutex_size(void) { return sizeof(pthread_mutex_t); }
size_t pthread_mutex_align(void) { return _Alignof(pthread_mutex_t); }
size_t pthread_barrier_size(void) { return sizeof(pthread_barrier_t); }
size_t pthread_barrier_align(void) { return _Alignof(pthread_barrier_t); }

/* <sys/mman.h> */
#define PROT_NONE 0
#define PROT_READ 1
#define PROT_WRITE 2
#define PROT_EXEC 4
#define MAP_FIXED 0
#define MAP_PRIVATE (1 << 0)
#define MAP_SHARED (1 << 1)
#define MAP_ANONYMOUS (1 << 2)
#define MAP_FIXED_PADDR (1 << 3)
#define MAP_DMA (1 << 4)
#define _MAP_CACHEABILITY_PROVIDED (1 << 8)
#define MAP_CACHEABILITY(x) (_MAP_CACHEABILITY_PROVIDED | (((x) & 0x7F) << 9))
#define MAP_FAILED ((void*) -1)

int VERIFY_PROT_NONE = PROT_NONE;
int VERIFY_PROT_READ = PROT_READ;
int VERIFY_PROT_WRITE = PROT_WRITE;
int VERIFY_PROT_EXEC = PROT_EXEC;
int VERIFY_MAP_FIXED = MAP_FIXED;
int VERIFY_MAP_PRIVATE = MAP_PRIVATE;
int VERIFY_MAP_SHARED = MAP_SHARED;
int VERIFY_MAP_ANONYMOUS = MAP_ANONYMOUS;
int VERIFY_MAP_FIXED_PADDR = MAP_FIXED_PADDR;
int VERIFY_MAP_DMA = MAP_DMA;

int map_cacheability(int x) { return MAP_CACHEABILITY(x); }
void *map_failed(void) { return MAP_FAILED; }

/* <pthread.h> */
int VERIFY_PTHREAD_BARRIER_SERIAL_THREAD = -1;
int VERIFY_PTHREAD_MUTEX_NORMAL = 0;
int VERIFY_PTHREAD_MUTEX_RECURSIVE = 1;
int VERIFY_PTHREAD_MUTEX_ERRORCHECK = 2;
int VERIFY_PTHREAD_MUTEX_DEFAULT = 3;
int VERIFY_PTHREAD_CREATE_DETACHED = 0;
int VERIFY_PTHREAD_CREATE_JOINABLE = 1;

/* newlib <sys/errno.h> */
int VERIFY_EPERM = 1;
int VERIFY_EAGAIN = 11;
int VERIFY_ENOMEM = 12;
int VERIFY_EBUSY = 16;
int VERIFY_EINVAL = 22;
int VERIFY_EDEADLK = 45;
int VERIFY_ENOSYS = 88;
int VERIFY_ENOTSUP = 134;
"#;

    let c_file = out_dir.join("newlib_reference.c");
    std::fs::write(&c_file, c_code).expect("Failed to write C reference code");

    cc::Build::new()
        .file(&c_file)
        .warnings(false)
        .static_flag(true)
        .compile("newlib_reference");
}
